use crate::atn::StateId;
use std::sync::Arc;

/// One frame of the parser's real invocation stack, as seen by prediction.
///
/// The root frame has no invoking state. Every other frame records the
/// state whose rule transition created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    parent: Option<Arc<RuleContext>>,
    invoking_state: Option<StateId>,
}

/// Root frame used when prediction is called without a caller context.
pub(crate) static ROOT: RuleContext = RuleContext { parent: None, invoking_state: None };

impl RuleContext {
    /// The outermost frame of a parse.
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self { parent: None, invoking_state: None })
    }

    /// A frame entered through the rule transition leaving `invoking_state`.
    #[must_use]
    pub fn new(parent: &Arc<Self>, invoking_state: StateId) -> Arc<Self> {
        Arc::new(Self { parent: Some(Arc::clone(parent)), invoking_state: Some(invoking_state) })
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn invoking_state(&self) -> Option<StateId> {
        self.invoking_state
    }

    /// True for the root frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invoking_state.is_none()
    }

    /// Number of frames from this one to the root, inclusive.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.parent.as_deref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.as_deref();
        }
        depth
    }
}
