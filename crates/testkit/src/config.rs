use lazyfetch_config::ConfigSource;

/// A fixed-answer [`ConfigSource`], standing in for the opaque registry or
/// config file a real host reads from.
#[derive(Default, Clone)]
pub struct FakeConfigSource {
    pub mode: Option<u32>,
    pub report_rate: Option<u32>,
    pub watch_paths: Option<Vec<String>>,
}

impl FakeConfigSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigSource for FakeConfigSource {
    fn get_u32(&self, key: &str) -> Option<u32> {
        match key {
            "OperationMode" => self.mode,
            "ReportRate" => self.report_rate,
            _ => None,
        }
    }

    fn get_multi_string(&self, key: &str) -> Option<Vec<String>> {
        match key {
            "WatchPaths" => self.watch_paths.clone(),
            _ => None,
        }
    }
}
