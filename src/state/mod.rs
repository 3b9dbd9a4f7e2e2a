//! The canonical in-memory state graph: users, channels, bans, monitors,
//! and the [`nexus::Nexus`] container that owns the indexes.

pub mod bans;
pub mod channel;
pub mod monitor;
pub mod nexus;
pub mod uid;
pub mod user;

pub use bans::{BanList, BanType, ServerBan};
pub use channel::{Channel, ChannelModes, JoinDenial, ListEntry, MemberModes, Topic};
pub use monitor::{MonitorCenter, MONITOR_LIMIT};
pub use nexus::{HotConfig, Nexus, ServerInfo};
pub use uid::{uid_sid, UidGenerator};
pub use user::{Uid, User, UserModes, WhowasEntry};
