use crate::errors::AssertError;

/// Supplies the document an assertion runs against when no subject is given,
/// typically the body of the last response seen by a test.
pub trait DocumentSource {
    fn current_document(&self) -> Result<String, AssertError>;
}

/// Test-case context holding the current response body.
/// The harness sets it once per test case; matching only reads it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    response_body: Option<String>,
}

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            response_body: Some(body.into()),
        }
    }

    pub fn set_response_body(&mut self, body: impl Into<String>) {
        self.response_body = Some(body.into());
    }

    pub fn clear(&mut self) {
        self.response_body = None;
    }
}

impl DocumentSource for Context {
    fn current_document(&self) -> Result<String, AssertError> {
        self.response_body
            .clone()
            .ok_or(AssertError::NoCurrentDocument)
    }
}

impl<F> DocumentSource for F
where
    F: Fn() -> Result<String, AssertError>,
{
    fn current_document(&self) -> Result<String, AssertError> {
        self()
    }
}
