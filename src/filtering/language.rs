// Language detection collaborator
use whatlang::Info;

/// Detects the dominant language of a text
pub trait LanguageDetector: Send + Sync {
    /// ISO 639-3 code of the detected language, or `None` when the text
    /// cannot be classified
    fn detect(&self, text: &str) -> Option<String>;
}

/// Trigram-based detection via whatlang
///
/// Detections whatlang itself flags as unreliable count as failures, which
/// is what happens for very short or mixed-script pages.
#[derive(Debug, Clone, Copy)]
pub struct WhatlangDetector {
    require_reliable: bool,
}

impl WhatlangDetector {
    pub fn new(require_reliable: bool) -> Self {
        Self { require_reliable }
    }

    fn accept(&self, info: &Info) -> bool {
        !self.require_reliable || info.is_reliable()
    }
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        whatlang::detect(text)
            .filter(|info| self.accept(info))
            .map(|info| info.lang().code().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let detector = WhatlangDetector::default();
        let text = "The committee reviewed the annual budget and approved the \
                    proposal for a new public library in the town centre. Work is \
                    expected to begin next spring once the contracts are signed.";
        assert_eq!(detector.detect(text).as_deref(), Some("eng"));
    }

    #[test]
    fn test_detects_french() {
        let detector = WhatlangDetector::default();
        let text = "Le conseil municipal a approuvé hier soir le nouveau budget \
                    pour la construction d'une bibliothèque publique. Les travaux \
                    devraient commencer au printemps prochain après la signature des contrats.";
        assert_eq!(detector.detect(text).as_deref(), Some("fra"));
    }

    #[test]
    fn test_empty_text_fails() {
        assert_eq!(WhatlangDetector::default().detect(""), None);
    }
}
