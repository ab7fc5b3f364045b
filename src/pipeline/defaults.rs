use crate::alignment::dictionary::Dictionary;
use crate::alignment::trace::{conform, parse_trace, AlignedUnit};
use crate::config::UnitGranularity;
use crate::error::SegmentationError;
use crate::pipeline::traits::TraceParser;

pub struct JuliusTraceParser;

impl TraceParser for JuliusTraceParser {
    fn parse(
        &self,
        trace: &str,
        dictionary: &Dictionary,
        granularity: UnitGranularity,
    ) -> Result<Vec<AlignedUnit>, SegmentationError> {
        let rows = parse_trace(trace)?;
        conform(&rows, dictionary, granularity)
    }
}

#[cfg(test)]
mod tests {
    use crate::alignment::dictionary::DictionaryBuilder;
    use crate::lexicon::Lexicon;

    use super::*;

    #[test]
    fn julius_trace_parser_parse() {
        let lexicon = Lexicon::from_entries([("a", vec!["a"])]).unwrap();
        let dictionary = DictionaryBuilder::new(&lexicon)
            .build(&["a".to_string()])
            .unwrap();
        let trace = "=== begin forced alignment ===\n\
                     [   0    2]  -1.0  silB\n\
                     [   3    7]  -1.0  a\n\
                     [   8    9]  -1.0  silE\n\
                     === end forced alignment ===\n";
        let units = JuliusTraceParser
            .parse(trace, &dictionary, UnitGranularity::Phoneme)
            .unwrap();
        let expected = conform(&parse_trace(trace).unwrap(), &dictionary, UnitGranularity::Phoneme)
            .unwrap();
        assert_eq!(units, expected);
        assert_eq!(units.len(), 3);
    }
}
