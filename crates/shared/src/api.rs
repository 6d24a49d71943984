use const_format::concatcp;

/// Paths under this prefix are answered by the host itself and never reach
/// the worker engine or the upstream
pub const WORKER_BASE_PATH: &str = "/_worker/";

/// Response header naming where the response was produced
/// (`network`, `cache`, `offline` or `passthrough`)
pub const SOURCE_HEADER: &str = "x-worker-source";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Object {
    Message,
    Diagnostics,
    Status,
}

impl Object {
    pub const fn path(&self) -> &str {
        use Object::*;
        match self {
            Message => concatcp!(WORKER_BASE_PATH, "message"),
            Diagnostics => concatcp!(WORKER_BASE_PATH, "diagnostics"),
            Status => concatcp!(WORKER_BASE_PATH, "status"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object_paths_live_under_worker_base() {
        for object in [Object::Message, Object::Diagnostics, Object::Status] {
            assert!(object.path().starts_with(WORKER_BASE_PATH));
        }
        assert_eq!(Object::Message.path(), "/_worker/message");
    }
}
