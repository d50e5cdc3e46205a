//! エンドポイント単位のスケジュール状態
//!
//! `Idle → Due → InFlight → Idle` の状態機械。非アクティブ化でどの状態からでも
//! `Disabled` に入り、再アクティブ化で `Idle` に戻る。ただし実行中のチェックは
//! 完了するまで `InFlight` のまま保持し、同一エンドポイントの二重実行を防ぐ。

use std::time::Duration;
use tokio::time::Instant;

/// スケジュール状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    /// 次の期限待ち
    Idle,
    /// 期限到来（ディスパッチ待ち）
    Due,
    /// 実行中
    InFlight,
    /// 監視停止中
    Disabled,
}

/// 実行中チェックの情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    generation: u64,
    deadline: Instant,
}

/// 1エンドポイントのスケジュール
#[derive(Debug, Clone)]
pub struct EndpointSchedule {
    state: CheckState,
    interval: Duration,
    last_completed_at: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl EndpointSchedule {
    /// 作成直後のスケジュール（最初のチェックは即時に期限到来）
    pub fn new(interval: Duration, active: bool) -> Self {
        Self {
            state: if active {
                CheckState::Idle
            } else {
                CheckState::Disabled
            },
            interval,
            last_completed_at: None,
            in_flight: None,
        }
    }

    /// 現在の状態
    pub fn state(&self) -> CheckState {
        self.state
    }

    /// チェック間隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 最後の完了時刻
    pub fn last_completed_at(&self) -> Option<Instant> {
        self.last_completed_at
    }

    /// 実行中か
    pub fn is_in_flight(&self) -> bool {
        self.state == CheckState::InFlight
    }

    /// レジストリの設定を反映する
    ///
    /// 間隔の変更は次の期限計算から効く。実行中のチェックには影響しない。
    pub fn sync(&mut self, active: bool, interval: Duration) {
        self.interval = interval;
        match (self.state, active) {
            (CheckState::InFlight, _) => {}
            (CheckState::Disabled, true) => self.state = CheckState::Idle,
            (_, false) => self.state = CheckState::Disabled,
            _ => {}
        }
    }

    /// 次の期限（未完了なら即時を表す `None`）
    pub fn next_due_at(&self) -> Option<Instant> {
        self.last_completed_at.map(|t| t + self.interval)
    }

    /// 期限を評価し、到来していれば `Due` に遷移する
    ///
    /// `Due` のまま残っている（前回ディスパッチできなかった）場合も `true`。
    pub fn evaluate(&mut self, now: Instant) -> bool {
        match self.state {
            CheckState::Due => true,
            CheckState::Idle => {
                let due = self.next_due_at().map_or(true, |at| now >= at);
                if due {
                    self.state = CheckState::Due;
                }
                due
            }
            CheckState::InFlight | CheckState::Disabled => false,
        }
    }

    /// `Due → InFlight`
    pub fn begin(&mut self, generation: u64, deadline: Instant) -> bool {
        if self.state != CheckState::Due {
            return false;
        }
        self.state = CheckState::InFlight;
        self.in_flight = Some(InFlight {
            generation,
            deadline,
        });
        true
    }

    /// 完了を反映する（`InFlight → Idle`）
    ///
    /// 世代が一致しない完了（ウォッチドッグで打ち切り済みなど）は無視して `false`。
    pub fn complete(&mut self, generation: u64, completed_at: Instant) -> bool {
        match self.in_flight {
            Some(flight) if flight.generation == generation && self.is_in_flight() => {
                self.finish(completed_at);
                true
            }
            _ => false,
        }
    }

    /// ウォッチドッグ期限を過ぎた実行中チェックを打ち切る
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.in_flight {
            Some(flight) if self.is_in_flight() && now >= flight.deadline => {
                self.finish(now);
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, completed_at: Instant) {
        self.state = CheckState::Idle;
        self.in_flight = None;
        self.last_completed_at = Some(completed_at);
    }
}
