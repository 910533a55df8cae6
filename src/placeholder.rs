use std::collections::BTreeSet;

use image::DynamicImage;

use crate::error::CertError;
use crate::ocr::{BoundingBox, OcrToken, TextRecognizer, prepare_for_ocr};

pub const DEFAULT_PLACEHOLDER: &str = "NAME";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlaceholderMatch {
    pub matched_text: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Finds the placeholder token of a template through an injected recognizer.
pub struct PlaceholderLocator<R> {
    recognizer: R,
    variants: BTreeSet<String>,
}

impl<R: TextRecognizer> PlaceholderLocator<R> {
    pub fn new(recognizer: R) -> Self {
        Self::with_variants(recognizer, [DEFAULT_PLACEHOLDER])
    }

    /// Blank spellings are ignored; an empty set falls back to `NAME`.
    pub fn with_variants<I, S>(recognizer: R, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut variants: BTreeSet<String> = variants
            .into_iter()
            .map(|variant| normalize_token(variant.as_ref()))
            .filter(|variant| !variant.is_empty())
            .collect();
        if variants.is_empty() {
            variants.insert(DEFAULT_PLACEHOLDER.to_string());
        }
        Self {
            recognizer,
            variants,
        }
    }

    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(String::as_str)
    }

    pub fn locate(&self, image: &DynamicImage) -> Result<PlaceholderMatch, CertError> {
        let tokens = self.recognize(image)?;
        match find_placeholder(&tokens, &self.variants) {
            Some(found) => {
                tracing::info!(
                    text = %found.matched_text,
                    x = found.bbox.x,
                    y = found.bbox.y,
                    w = found.bbox.width,
                    h = found.bbox.height,
                    "placeholder located"
                );
                Ok(found)
            }
            None => {
                tracing::debug!(tokens = tokens.len(), "no placeholder token among OCR words");
                Err(CertError::placeholder_not_found())
            }
        }
    }

    /// Like [`locate`](Self::locate), but also hands back every recognized token.
    pub fn locate_with_tokens(
        &self,
        image: &DynamicImage,
    ) -> Result<(Option<PlaceholderMatch>, Vec<OcrToken>), CertError> {
        let tokens = self.recognize(image)?;
        let found = find_placeholder(&tokens, &self.variants);
        Ok((found, tokens))
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
        let prepared = DynamicImage::ImageLuma8(prepare_for_ocr(image));
        self.recognizer.recognize(&prepared)
    }
}

/// First token, in engine order, whose normalized text is an accepted spelling.
///
/// Engine order is usually reading order but tesseract does not promise it,
/// so with several matching tokens the winner is whatever the engine emitted
/// first.
pub fn find_placeholder(
    tokens: &[OcrToken],
    variants: &BTreeSet<String>,
) -> Option<PlaceholderMatch> {
    tokens
        .iter()
        .find(|token| variants.contains(&normalize_token(&token.text)))
        .map(|token| PlaceholderMatch {
            matched_text: token.text.trim().to_string(),
            bbox: token.bbox,
        })
}

fn normalize_token(text: &str) -> String {
    text.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FixedTokens;
    use image::RgbImage;

    struct BrokenEngine;

    impl TextRecognizer for BrokenEngine {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
            Err(CertError::OcrEngine("backend unavailable".to_string()))
        }
    }

    fn token(text: &str, x: u32, y: u32, w: u32, h: u32) -> OcrToken {
        OcrToken {
            text: text.to_string(),
            bbox: BoundingBox::new(x, y, w, h),
            conf: 90.0,
        }
    }

    fn blank() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(16, 16))
    }

    #[test]
    fn matches_case_insensitively_and_keeps_engine_box() {
        let locator = PlaceholderLocator::new(FixedTokens(vec![
            token("Certificate", 10, 10, 200, 40),
            token(" name ", 300, 250, 200, 60),
        ]));
        let found = locator.locate(&blank()).unwrap();
        assert_eq!(found.matched_text, "name");
        assert_eq!(found.bbox, BoundingBox::new(300, 250, 200, 60));
    }

    #[test]
    fn first_match_in_engine_order_wins() {
        let locator = PlaceholderLocator::new(FixedTokens(vec![
            token("NAME", 50, 400, 100, 30),
            token("NAME", 50, 100, 100, 30),
        ]));
        let found = locator.locate(&blank()).unwrap();
        assert_eq!(found.bbox.y, 400);
    }

    #[test]
    fn partial_words_do_not_match() {
        let locator = PlaceholderLocator::new(FixedTokens(vec![
            token("NAMES", 0, 0, 10, 10),
            token("Surname", 0, 20, 10, 10),
        ]));
        let err = locator.locate(&blank()).unwrap_err();
        assert!(err.is_placeholder_not_found());
        assert!(err.to_string().contains("NAME"));
    }

    #[test]
    fn engine_failure_is_not_reported_as_missing_placeholder() {
        let locator = PlaceholderLocator::new(BrokenEngine);
        let err = locator.locate(&blank()).unwrap_err();
        assert!(matches!(err, CertError::OcrEngine(_)));
    }

    #[test]
    fn extra_spellings_are_accepted() {
        let locator = PlaceholderLocator::with_variants(
            FixedTokens(vec![token("{Recipient}", 5, 5, 80, 20)]),
            ["name", "{recipient}", "  "],
        );
        assert_eq!(locator.variants().collect::<Vec<_>>(), vec!["NAME", "{RECIPIENT}"]);
        assert_eq!(locator.locate(&blank()).unwrap().matched_text, "{Recipient}");
    }

    #[test]
    fn empty_variant_list_falls_back_to_name() {
        let locator = PlaceholderLocator::with_variants(FixedTokens(vec![]), Vec::<String>::new());
        assert_eq!(locator.variants().collect::<Vec<_>>(), vec!["NAME"]);
    }

    struct SeesLuma;

    impl TextRecognizer for SeesLuma {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
            let luma = image.as_luma8().expect("luma input");
            assert_eq!(luma.get_pixel(0, 0)[0], 255);
            Ok(vec![token("NAME", 1, 1, 2, 2)])
        }
    }

    #[test]
    fn recognizer_receives_flattened_luma() {
        let transparent = DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4));
        let found = PlaceholderLocator::new(SeesLuma).locate(&transparent).unwrap();
        assert_eq!(found.bbox, BoundingBox::new(1, 1, 2, 2));
    }
}
