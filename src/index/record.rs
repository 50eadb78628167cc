//! Built-in record extractor: separator-delimited records with a regex
//! identifier capture.

use regex::bytes::Regex;

use super::chunk::{ChunkSink, RecordIndexer};

/// Extracts one identifier per separator-delimited record.
///
/// Complete records get a direct entry at the record's starting offset; a
/// partial trailing record is deferred to the next chunk. Records the
/// pattern does not match are skipped.
pub struct PatternIndexer {
    pattern: Regex,
    separator: u8,
}

impl PatternIndexer {
    /// `pattern` is matched against each record; capture group 1 (or the
    /// whole match when the pattern has no groups) becomes the identifier.
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            separator: b'\n',
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }
}

impl RecordIndexer for PatternIndexer {
    fn index_chunk(&self, buffer: &[u8], sink: &mut ChunkSink) {
        let mut start = 0;
        while let Some(found) = buffer[start..].iter().position(|b| *b == self.separator) {
            let record = &buffer[start..start + found];
            if let Some(captures) = self.pattern.captures(record) {
                let hit = captures.get(1).or_else(|| captures.get(0));
                if let Some(hit) = hit {
                    if let Ok(identifier) = std::str::from_utf8(hit.as_bytes()) {
                        sink.add_index(identifier, start);
                    }
                }
            }
            start += found + 1;
        }
        sink.mark_processed(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::chunk::SinkOp;

    fn run(indexer: &PatternIndexer, buffer: &[u8]) -> ChunkSink {
        let mut sink = ChunkSink::default();
        indexer.index_chunk(buffer, &mut sink);
        sink
    }

    #[test]
    fn test_extracts_identifier_per_record() {
        let indexer = PatternIndexer::new(Regex::new("^([^:]+)").unwrap());
        let sink = run(&indexer, b"alpha:1\nbeta:2\n");

        assert_eq!(
            sink.ops,
            vec![
                SinkOp::Direct {
                    identifier: "alpha".to_string(),
                    offset: 0
                },
                SinkOp::Direct {
                    identifier: "beta".to_string(),
                    offset: 8
                },
            ]
        );
        assert_eq!(sink.processed_to, Some(15));
    }

    #[test]
    fn test_partial_trailing_record_is_deferred() {
        let indexer = PatternIndexer::new(Regex::new("^([^:]+)").unwrap());
        let sink = run(&indexer, b"alpha:1\nbeta:2\npartial");

        assert_eq!(sink.ops.len(), 2);
        // everything before "partial" is consumed
        assert_eq!(sink.processed_to, Some(15));
    }

    #[test]
    fn test_non_matching_records_are_skipped() {
        let indexer = PatternIndexer::new(Regex::new("^id=(\\w+)").unwrap());
        let sink = run(&indexer, b"noise\nid=seven here\n");

        assert_eq!(
            sink.ops,
            vec![SinkOp::Direct {
                identifier: "seven".to_string(),
                offset: 6
            }]
        );
    }

    #[test]
    fn test_custom_separator() {
        let indexer =
            PatternIndexer::new(Regex::new("^([^:]+)").unwrap()).with_separator(b'\x1e');
        let sink = run(&indexer, b"alpha:1\x1ebeta:2\x1e");

        assert_eq!(sink.ops.len(), 2);
        assert_eq!(sink.processed_to, Some(15));
    }
}
