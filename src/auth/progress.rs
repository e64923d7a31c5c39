use super::device_code::DeviceCodeSession;

/// Destination for human-readable progress during an interactive login.
///
/// Purely advisory: nothing a sink does affects the flow.
pub trait ProgressSink: Send + Sync {
    /// A device code was issued; show the user where to go and what to type.
    fn device_code_issued(&self, session: &DeviceCodeSession);
    /// Emitted once per elapsed minute while waiting for authorization.
    fn time_remaining(&self, seconds: i64);
}

/// Discards all progress output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn device_code_issued(&self, _session: &DeviceCodeSession) {}
    fn time_remaining(&self, _seconds: i64) {}
}
