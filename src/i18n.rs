//! Terminal labels for the CLI. Selected with `--locale` (e.g. `--locale zh`).
//! Messages coming from the backend are shown as-is in either locale.

use crate::engine::model::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn from_tag(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub idle: &'static str,
    pub submitting: &'static str,
    pub streaming: &'static str,
    pub fetching: &'static str,
    pub done: &'static str,
    pub error: &'static str,
    pub job_accepted: &'static str,
    pub bpm_label: &'static str,
    pub saved_to: &'static str,
    pub job_prefix: &'static str,
    pub error_prefix: &'static str,
}

impl Messages {
    pub fn status(&self, status: JobStatus) -> &'static str {
        match status {
            JobStatus::Idle => self.idle,
            JobStatus::Submitting => self.submitting,
            JobStatus::Streaming => self.streaming,
            JobStatus::Fetching => self.fetching,
            JobStatus::Done => self.done,
            JobStatus::Error => self.error,
        }
    }
}

pub static EN: Messages = Messages {
    idle: "idle",
    submitting: "uploading",
    streaming: "processing",
    fetching: "fetching result",
    done: "done",
    error: "failed",
    job_accepted: "Job accepted",
    bpm_label: "BPM",
    saved_to: "MIDI saved to",
    job_prefix: "JOB",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    idle: "空闲",
    submitting: "上传中",
    streaming: "处理中",
    fetching: "获取结果",
    done: "完成",
    error: "失败",
    job_accepted: "任务已受理",
    bpm_label: "速度",
    saved_to: "MIDI 已保存到",
    job_prefix: "任务",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}
