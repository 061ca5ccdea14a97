//! Text buffer delivered on the child's standard input.

/// Append-only script for one run, built by successive logical commands.
///
/// Prepending is supported for steps that must precede everything already
/// queued. The buffer is replaced (never truncated) when the runner resets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandScript {
    text: String,
}

impl CommandScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn prepend(&mut self, text: &str) {
        self.text.insert_str(0, text);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_goes_before_queued_text() {
        let mut script = CommandScript::new();
        script.append("FIND\n1,1\n");
        script.append("PHOT\n");
        script.prepend("ATTACH\ni.fits\n");
        assert_eq!(script.as_str(), "ATTACH\ni.fits\nFIND\n1,1\nPHOT\n");
    }

    #[test]
    fn empty_until_first_append() {
        let mut script = CommandScript::new();
        assert!(script.is_empty());
        script.append("");
        assert!(script.is_empty());
        script.append("EXIT\n");
        assert!(!script.is_empty());
    }
}
