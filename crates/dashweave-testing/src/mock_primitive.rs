//! Mock primitive for testing workflows without their real dependencies

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashweave::{Error, Result, WorkflowContext, WorkflowPrimitive};

/// Handler function type for dynamic mock responses
pub type MockHandler<I, O> = Arc<dyn Fn(&I) -> Result<O> + Send + Sync>;

/// One scripted step of a [`MockPrimitive`] sequence
#[derive(Debug, Clone)]
pub enum MockStep<O> {
    /// Return this value
    Ok(O),
    /// Fail with a target error of this kind
    Err {
        /// Error kind label, e.g. `ConnectionError`
        kind: String,
        /// Error message
        message: String,
    },
}

impl<O> MockStep<O> {
    /// A successful step
    pub fn ok(value: O) -> Self {
        Self::Ok(value)
    }

    /// A failing step
    pub fn err(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Err {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone)]
enum Program<I, O> {
    Value(O),
    Sequence(Vec<MockStep<O>>),
    Fail { kind: String, message: String },
    Handler(MockHandler<I, O>),
}

struct MockState<I, O> {
    program: Program<I, O>,
    position: usize,
    inputs: Vec<I>,
}

/// A declaratively-programmed primitive for tests
///
/// Programs: a fixed return value, a scripted sequence of results, a fixed
/// failure, or a handler callable - plus an optional artificial delay. The
/// mock tracks its call count and captured inputs and participates in
/// composition, instrumentation, and recovery like any other primitive.
/// Clones share state, so a mock can be both composed into a workflow and
/// inspected afterwards.
///
/// # Example
///
/// ```rust
/// use dashweave_testing::MockPrimitive;
///
/// let search: MockPrimitive<String, String> =
///     MockPrimitive::returning("search", "results".to_string());
/// ```
pub struct MockPrimitive<I, O> {
    name: String,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState<I, O>>>,
}

impl<I, O> Clone for MockPrimitive<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            delay: self.delay,
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, O> std::fmt::Debug for MockPrimitive<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPrimitive")
            .field("name", &self.name)
            .field("call_count", &self.call_count())
            .finish()
    }
}

impl<I, O> MockPrimitive<I, O> {
    fn with_program(name: impl Into<String>, program: Program<I, O>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            state: Arc::new(Mutex::new(MockState {
                program,
                position: 0,
                inputs: Vec::new(),
            })),
        }
    }

    /// A mock returning the same value on every call
    pub fn returning(name: impl Into<String>, value: O) -> Self {
        Self::with_program(name, Program::Value(value))
    }

    /// A mock playing a scripted sequence of results, one per call
    ///
    /// Calls past the end of the sequence fail with kind
    /// `MockSequenceExhausted`.
    pub fn with_sequence(name: impl Into<String>, steps: Vec<MockStep<O>>) -> Self {
        Self::with_program(name, Program::Sequence(steps))
    }

    /// A mock failing every call with a target error of the given kind
    pub fn failing(
        name: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_program(
            name,
            Program::Fail {
                kind: kind.into(),
                message: message.into(),
            },
        )
    }

    /// A mock producing output through a handler callable
    pub fn from_handler<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&I) -> Result<O> + Send + Sync + 'static,
    {
        Self::with_program(name, Program::Handler(Arc::new(handler)))
    }

    /// Add an artificial delay before each response
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState<I, O>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// How many times the mock was invoked
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().inputs.len()
    }

    /// Reset the call count, captured inputs, and sequence position
    pub fn reset(&self) {
        let mut state = self.lock();
        state.inputs.clear();
        state.position = 0;
    }
}

impl<I: Clone, O> MockPrimitive<I, O> {
    /// The captured inputs, in call order
    #[must_use]
    pub fn inputs(&self) -> Vec<I> {
        self.lock().inputs.clone()
    }

    /// True when any captured input satisfies the predicate
    pub fn was_called_with<F>(&self, predicate: F) -> bool
    where
        F: Fn(&I) -> bool,
    {
        self.lock().inputs.iter().any(predicate)
    }
}

#[async_trait]
impl<I, O> WorkflowPrimitive for MockPrimitive<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;

    async fn execute(&self, input: I, _context: &WorkflowContext) -> Result<O> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut state = self.lock();
            state.inputs.push(input.clone());
            match &state.program {
                Program::Value(value) => Ok(value.clone()),
                Program::Fail { kind, message } => Err(Error::target(
                    self.name.clone(),
                    kind.clone(),
                    anyhow::anyhow!("{message}"),
                )),
                Program::Handler(handler) => handler(&input),
                Program::Sequence(steps) => {
                    let step = steps.get(state.position).cloned();
                    state.position += 1;
                    match step {
                        Some(MockStep::Ok(value)) => Ok(value),
                        Some(MockStep::Err { kind, message }) => Err(Error::target(
                            self.name.clone(),
                            kind,
                            anyhow::anyhow!("{message}"),
                        )),
                        None => Err(Error::target(
                            self.name.clone(),
                            "MockSequenceExhausted",
                            anyhow::anyhow!("sequence exhausted after {} steps", state.position - 1),
                        )),
                    }
                }
            }
        };
        outcome
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returning_same_value_every_call() {
        let mock: MockPrimitive<i64, String> =
            MockPrimitive::returning("fixed", "v".to_string());
        let ctx = WorkflowContext::new();
        for i in 0..5 {
            assert_eq!(mock.execute(i, &ctx).await.unwrap(), "v");
        }
        assert_eq!(mock.call_count(), 5);
    }

    #[tokio::test]
    async fn test_sequence_plays_in_order() {
        let mock: MockPrimitive<(), &'static str> = MockPrimitive::with_sequence(
            "flaky",
            vec![
                MockStep::err("ConnectionError", "refused"),
                MockStep::err("ConnectionError", "refused"),
                MockStep::ok("ok"),
            ],
        );
        let ctx = WorkflowContext::new();
        assert_eq!(
            mock.execute((), &ctx).await.unwrap_err().kind_label(),
            "ConnectionError"
        );
        assert_eq!(
            mock.execute((), &ctx).await.unwrap_err().kind_label(),
            "ConnectionError"
        );
        assert_eq!(mock.execute((), &ctx).await.unwrap(), "ok");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_sequence_exhaustion() {
        let mock: MockPrimitive<(), i64> =
            MockPrimitive::with_sequence("short", vec![MockStep::ok(1)]);
        let ctx = WorkflowContext::new();
        mock.execute((), &ctx).await.unwrap();
        let err = mock.execute((), &ctx).await.unwrap_err();
        assert_eq!(err.kind_label(), "MockSequenceExhausted");
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock: MockPrimitive<i64, i64> =
            MockPrimitive::failing("down", "RuntimeError", "always broken");
        let ctx = WorkflowContext::new();
        let err = mock.execute(1, &ctx).await.unwrap_err();
        assert_eq!(err.kind_label(), "RuntimeError");
        assert!(err.to_string().contains("down"));
        // Failures still count as calls
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handler_mock() {
        let mock = MockPrimitive::from_handler("echo", |input: &String| {
            Ok(format!("echo: {input}"))
        });
        let ctx = WorkflowContext::new();
        let out = mock.execute("hi".to_string(), &ctx).await.unwrap();
        assert_eq!(out, "echo: hi");
    }

    #[tokio::test]
    async fn test_captured_inputs_and_predicate() {
        let mock: MockPrimitive<String, i64> = MockPrimitive::returning("capture", 0);
        let ctx = WorkflowContext::new();
        mock.execute("first".to_string(), &ctx).await.unwrap();
        mock.execute("second".to_string(), &ctx).await.unwrap();

        assert_eq!(mock.inputs(), vec!["first", "second"]);
        assert!(mock.was_called_with(|i| i.contains("sec")));
        assert!(!mock.was_called_with(|i| i.contains("third")));
    }

    #[tokio::test]
    async fn test_reset_restores_sequence_and_history() {
        let mock: MockPrimitive<(), i64> = MockPrimitive::with_sequence(
            "resettable",
            vec![MockStep::ok(1), MockStep::ok(2)],
        );
        let ctx = WorkflowContext::new();
        assert_eq!(mock.execute((), &ctx).await.unwrap(), 1);
        assert_eq!(mock.execute((), &ctx).await.unwrap(), 2);

        mock.reset();
        assert_eq!(mock.call_count(), 0);
        assert_eq!(mock.execute((), &ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        tokio::time::pause();
        let mock: MockPrimitive<(), i64> =
            MockPrimitive::returning("slow", 1).with_delay(Duration::from_millis(500));
        let ctx = WorkflowContext::new();
        let started = tokio::time::Instant::now();
        mock.execute((), &ctx).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let mock: MockPrimitive<i64, i64> = MockPrimitive::returning("shared", 0);
        let cloned = mock.clone();
        let ctx = WorkflowContext::new();
        mock.execute(1, &ctx).await.unwrap();
        cloned.execute(2, &ctx).await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(cloned.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_composes_in_pipelines() {
        use dashweave::WorkflowPrimitiveExt;
        let first: MockPrimitive<i64, i64> = MockPrimitive::from_handler("inc", |x| Ok(x + 1));
        let second: MockPrimitive<i64, i64> = MockPrimitive::from_handler("double", |x| Ok(x * 2));
        let pipeline = first.clone().then(second.clone());

        let ctx = WorkflowContext::new();
        assert_eq!(pipeline.execute(5, &ctx).await.unwrap(), 12);
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.inputs(), vec![6]);
    }
}
