//! ヘルスチェック
//!
//! HTTPプローブ、エンドポイント単位の状態機械、ディスパッチループ。

pub mod executor;
pub mod scheduler;
pub mod state;

pub use executor::{HttpProbe, Probe};
pub use scheduler::{CheckScheduler, SchedulerHandle, SchedulerSettings, SchedulerTrigger};
pub use state::{CheckState, EndpointSchedule};
