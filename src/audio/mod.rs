//! # Audio Module
//!
//! Per-guild playback queue engine.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue state
//! - Ordered track list, cursor and loop flags for one guild
//! - Pure transition decisions (what plays next, jump/skip bookkeeping)
//!
//! ### [`player`] - Queue manager
//! - Guild → queue registry, created on first play and removed on stop or
//!   exhaustion
//! - Resolves references before handing tracks to the guild worker
//!
//! ### `worker` - Guild worker
//! - One task per guild processing commands and session signals in order
//! - Skips forward over tracks whose stream cannot be opened
//!
//! ### [`session`] / [`voice`] - Playback session
//! - Contract for the audio sink plus its songbird implementation
//! - Signals tagged with a generation so stale `Idle`/`Error` are dropped
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use sen_music::{audio::player::QueueManager, sources::SoundCloudResolver};
//! use serenity::all::GuildId;
//!
//! # async fn example(
//! #     connector: &sen_music::audio::voice::VoiceConnector,
//! #     notifier: Arc<dyn sen_music::audio::notify::Notifier>,
//! # ) -> anyhow::Result<()> {
//! let resolver = Arc::new(SoundCloudResolver::new(Duration::from_secs(30), 100));
//! let manager = QueueManager::new(resolver, 1000);
//! let guild_id = GuildId::new(123456789);
//!
//! manager
//!     .enqueue(guild_id, "https://soundcloud.com/artist/track", connector, notifier)
//!     .await?;
//! manager.skip(guild_id, 1).await?;
//! manager.stop(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod notify;
pub mod player;
pub mod queue;
pub mod session;
pub mod voice;
pub(crate) mod worker;
