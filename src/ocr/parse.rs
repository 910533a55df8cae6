use crate::ocr::{BoundingBox, OcrToken};

const WORD_LEVEL: i32 = 5;

/// Parses tesseract TSV output into word tokens, keeping row order.
///
/// Rows above word level (page, block, paragraph, line) and rows with empty
/// text are dropped. Malformed rows are skipped rather than failing the page.
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            cols[6].parse::<u32>(),
            cols[7].parse::<u32>(),
            cols[8].parse::<u32>(),
            cols[9].parse::<u32>(),
        ) else {
            continue;
        };
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);

        tokens.push(OcrToken {
            text: text.to_string(),
            bbox: BoundingBox::new(left, top, width, height),
            conf,
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn keeps_word_rows_in_engine_order() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
             4\t1\t1\t1\t1\t0\t120\t80\t400\t40\t-1\t\n\
             5\t1\t1\t1\t1\t1\t120\t80\t180\t40\t96.2\tCertificate\n\
             5\t1\t1\t1\t1\t2\t310\t80\t60\t40\t91.0\tof\n\
             5\t1\t2\t1\t1\t1\t300\t250\t200\t60\t88.5\tNAME\n"
        );
        let tokens = parse_tsv_words(&tsv);
        let texts: Vec<_> = tokens.iter().map(|token| token.text.as_str()).collect();
        assert_eq!(texts, vec!["Certificate", "of", "NAME"]);
        assert_eq!(tokens[2].bbox, BoundingBox::new(300, 250, 200, 60));
        assert!((tokens[2].conf - 88.5).abs() < f32::EPSILON);
    }

    #[test]
    fn skips_blank_and_malformed_rows() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t10\t20\t20\t-1\t   \n\
             5\t1\t1\t1\t1\t2\tx\t10\t20\t20\t90\tbroken\n\
             5\t1\t1\t1\t1\t3\t40\t10\t20\t20\t90\n\
             5\t1\t1\t1\t1\t4\t70\t12\t30\t18\t77\tok\n"
        );
        let tokens = parse_tsv_words(&tsv);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "ok");
        assert_eq!(tokens[0].bbox, BoundingBox::new(70, 12, 30, 18));
    }
}
