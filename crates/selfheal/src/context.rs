//! Test and execution context recorded with each heal.

use serde::{Deserialize, Serialize};

use crate::engine::EngineEnvironment;
use crate::result::EngineError;

/// Name recorded when the running test cannot be identified
pub const UNKNOWN_TEST: &str = "unknown_test";

/// Which test a heal happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestContext {
    /// Full test path as reported by the harness
    pub test_name: String,
    /// Source file, when the path carries one
    pub test_file: Option<String>,
    /// Enclosing module path
    pub test_class: Option<String>,
    /// Test function name
    pub test_method: Option<String>,
    /// Line of the failing call, when known
    pub line_number: Option<u32>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::parse(UNKNOWN_TEST)
    }
}

impl TestContext {
    /// Context for the test running on this thread.
    ///
    /// The libtest harness names each test thread after the test path
    /// (`module::test_fn`). Unnamed threads and `main` yield
    /// [`UNKNOWN_TEST`].
    #[must_use]
    pub fn current() -> Self {
        match std::thread::current().name() {
            Some(name) if name != "main" && !name.starts_with("tokio-runtime") => {
                Self::parse(name)
            }
            _ => Self::default(),
        }
    }

    /// Split `path/to/file.rs::module::test_fn` into its parts.
    ///
    /// A leading segment that looks like a file path becomes `test_file`;
    /// the last segment is the method and anything between is the class.
    #[must_use]
    pub fn parse(test_name: &str) -> Self {
        let mut segments: Vec<&str> = test_name.split("::").filter(|s| !s.is_empty()).collect();

        let test_file = match segments.first() {
            Some(first) if first.ends_with(".rs") || first.contains('/') => {
                Some(segments.remove(0).to_string())
            }
            _ => None,
        };
        let test_method = segments.pop().map(str::to_string);
        let test_class = if segments.is_empty() {
            None
        } else {
            Some(segments.join("::"))
        };

        Self {
            test_name: test_name.to_string(),
            test_file,
            test_class,
            test_method,
            line_number: None,
        }
    }

    /// Set the line number
    #[must_use]
    pub const fn with_line(mut self, line: u32) -> Self {
        self.line_number = Some(line);
        self
    }
}

/// Environment captured at the moment of a heal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealContext {
    /// Browser kind or `unknown`
    pub browser: String,
    /// Viewport as `WxH` or `unknown`
    pub viewport: String,
    /// Consecutive failures of this locator in the call
    pub failure_count: u32,
    /// Raw engine failure text
    pub stack_trace: String,
}

impl HealContext {
    /// Capture from the engine environment and the triggering failure
    #[must_use]
    pub fn capture(environment: &EngineEnvironment, failure: &EngineError) -> Self {
        Self {
            browser: environment
                .browser
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            viewport: environment
                .viewport
                .map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            failure_count: 1,
            stack_trace: failure.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Viewport;

    #[test]
    fn test_parse_full_path() {
        let ctx = TestContext::parse("tests/checkout.rs::payment::test_submit_order");
        assert_eq!(ctx.test_file.as_deref(), Some("tests/checkout.rs"));
        assert_eq!(ctx.test_class.as_deref(), Some("payment"));
        assert_eq!(ctx.test_method.as_deref(), Some("test_submit_order"));
    }

    #[test]
    fn test_parse_libtest_thread_name() {
        let ctx = TestContext::parse("page::tests::heal_tests::test_click");
        assert_eq!(ctx.test_file, None);
        assert_eq!(ctx.test_class.as_deref(), Some("page::tests::heal_tests"));
        assert_eq!(ctx.test_method.as_deref(), Some("test_click"));
    }

    #[test]
    fn test_parse_bare_name() {
        let ctx = TestContext::parse("test_login");
        assert_eq!(ctx.test_class, None);
        assert_eq!(ctx.test_method.as_deref(), Some("test_login"));
    }

    #[test]
    fn test_current_uses_thread_name() {
        let ctx = std::thread::Builder::new()
            .name("suite::test_named_thread".to_string())
            .spawn(TestContext::current)
            .map(|h| h.join());
        let ctx = match ctx {
            Ok(Ok(ctx)) => ctx,
            _ => panic!("thread failed"),
        };
        assert_eq!(ctx.test_name, "suite::test_named_thread");
        assert_eq!(ctx.test_method.as_deref(), Some("test_named_thread"));
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(TestContext::default().test_name, UNKNOWN_TEST);
    }

    #[test]
    fn test_heal_context_capture() {
        let env = EngineEnvironment {
            browser: Some("chromium".to_string()),
            viewport: Some(Viewport {
                width: 1920,
                height: 1080,
            }),
        };
        let ctx = HealContext::capture(&env, &EngineError::timeout("Timeout 5000ms exceeded."));
        assert_eq!(ctx.browser, "chromium");
        assert_eq!(ctx.viewport, "1920x1080");
        assert_eq!(ctx.failure_count, 1);
        assert_eq!(ctx.stack_trace, "Timeout 5000ms exceeded.");

        let unknown = HealContext::capture(&EngineEnvironment::default(), &EngineError::timeout("t"));
        assert_eq!(unknown.browser, "unknown");
        assert_eq!(unknown.viewport, "unknown");
    }
}
