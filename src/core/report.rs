use serde::Serialize;

use super::journal::LogRecord;

/// 单轮同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass_id: String,
    pub start_time: i64,
    pub end_time: i64,
    /// 耗时（毫秒）
    pub duration_ms: u64,
    pub dirs_visited: u32,
    pub files_replicated: u32,
    pub files_updated: u32,
    pub files_unchanged: u32,
    pub entries_removed: u32,
    /// 删除阶段因数量判断未触发而保留的多余条目
    pub prune_skipped: u32,
}

impl PassReport {
    pub(crate) fn begin() -> Self {
        Self {
            pass_id: uuid::Uuid::new_v4().to_string(),
            start_time: chrono::Utc::now().timestamp(),
            end_time: 0,
            duration_ms: 0,
            dirs_visited: 0,
            files_replicated: 0,
            files_updated: 0,
            files_unchanged: 0,
            entries_removed: 0,
            prune_skipped: 0,
        }
    }

    pub(crate) fn count(&mut self, record: &LogRecord) {
        match record {
            LogRecord::Replicated { .. } => self.files_replicated += 1,
            LogRecord::Updated { .. } => self.files_updated += 1,
            LogRecord::Removed { .. } => self.entries_removed += 1,
        }
    }

    pub(crate) fn finish(&mut self, duration_ms: u64) {
        self.end_time = chrono::Utc::now().timestamp();
        self.duration_ms = duration_ms;
    }

    /// 本轮写入的动作记录数
    pub fn total_actions(&self) -> u32 {
        self.files_replicated + self.files_updated + self.entries_removed
    }

    pub fn is_noop(&self) -> bool {
        self.total_actions() == 0
    }
}
