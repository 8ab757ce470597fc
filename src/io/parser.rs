//! # Streaming VCF Parser
//!
//! Single-pass driver: consumes header and records from any `BufRead`,
//! applies admission filters, decodes genotype columns and dispatches each
//! accepted variant to the registered handlers in order.
//!
//! Per-record failures are annotated with the line number and routed to a
//! caller-overridable error hook; parsing then resumes with the next
//! record. Header problems, cancellation and internal invariant violations
//! terminate the parse.

use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::data::{Position, Variant};
use crate::error::{RafterError, Result};
use crate::io::filter::{Stat, VcfFilter, VcfFilterStats};
use crate::io::format::FormatReader;
use crate::io::handlers::VariantsHandler;

/// The nine fixed VCF columns, in required order.
const FIELDS: [&str; 9] = [
    "CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT",
];

const CHROM: usize = 0;
const POS: usize = 1;
const REF: usize = 3;
const ALT: usize = 4;
const FILTER: usize = 6;
const FORMAT: usize = 8;

/// Handlers are shared with the caller; the core is single-threaded.
pub type SharedHandler = Rc<RefCell<dyn VariantsHandler>>;

/// Streaming VCF parser driving a chain of [`VariantsHandler`]s.
pub struct VcfParser<R: BufRead> {
    input: R,
    filter: VcfFilter,
    stats: VcfFilterStats,
    handlers: Vec<(SharedHandler, i32)>,
    samples: Vec<String>,
    /// Token indices (into the fully split record) of admitted samples.
    filtered_samples: Vec<usize>,
    n_header_samples: usize,
    line_num: u64,
    interrupt: Option<Box<dyn Fn() -> bool>>,
    error_hook: Option<Box<dyn FnMut(&RafterError)>>,
}

impl<R: BufRead> VcfParser<R> {
    pub fn new(input: R, filter: VcfFilter) -> Self {
        Self {
            input,
            filter,
            stats: VcfFilterStats::new(),
            handlers: Vec::new(),
            samples: Vec::new(),
            filtered_samples: Vec::new(),
            n_header_samples: 0,
            line_num: 0,
            interrupt: None,
            error_hook: None,
        }
    }

    /// Register a handler; lower `order` runs first, ties keep
    /// registration order.
    pub fn register_handler(&mut self, handler: SharedHandler, order: i32) {
        self.handlers.push((handler, order));
        self.handlers.sort_by_key(|(_, order)| *order);
    }

    /// Install a cooperative-cancellation probe, polled once per record.
    pub fn set_interrupt(&mut self, probe: impl Fn() -> bool + 'static) {
        self.interrupt = Some(Box::new(probe));
    }

    /// Replace the default per-record error handler (warn and continue).
    pub fn set_error_hook(&mut self, hook: impl FnMut(&RafterError) + 'static) {
        self.error_hook = Some(Box::new(hook));
    }

    /// Admitted sample names, in header order.
    pub fn sample_names(&self) -> &[String] {
        &self.samples
    }

    pub fn stats(&self) -> &VcfFilterStats {
        &self.stats
    }

    pub fn into_stats(self) -> VcfFilterStats {
        self.stats
    }

    /// Consume `##` meta lines and the `#CHROM` header row.
    ///
    /// Verifies the nine fixed columns and derives the admitted sample
    /// set from the remaining columns.
    pub fn parse_header(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(RafterError::header("no VCF header found in given file"));
            }
            self.line_num += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.starts_with("##") {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('#') {
                return self.read_column_header(header);
            }
            return Err(RafterError::header("no VCF header found in given file"));
        }
    }

    fn read_column_header(&mut self, header: &str) -> Result<()> {
        let tokens: Vec<&str> = header.split('\t').collect();
        if tokens.len() < FIELDS.len() {
            return Err(RafterError::header(format!(
                "header has {} columns, expected at least {}",
                tokens.len(),
                FIELDS.len()
            )));
        }
        for (i, expected) in FIELDS.iter().enumerate() {
            if tokens[i] != *expected {
                return Err(RafterError::header(format!(
                    "wrong header line: expected column {expected}, found {}",
                    tokens[i]
                )));
            }
        }
        self.n_header_samples = tokens.len() - FIELDS.len();
        for (i, token) in tokens.iter().enumerate().skip(FIELDS.len()) {
            if self.filter.apply_sample(token) {
                self.samples.push((*token).to_string());
                self.filtered_samples.push(i);
            }
        }
        info!(
            n_samples = self.n_header_samples,
            admitted = self.samples.len(),
            "parsed VCF header"
        );
        Ok(())
    }

    /// Stream every record to the registered handlers, then finalise them.
    pub fn parse_genotypes(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            self.line_num += 1;
            if let Some(probe) = &self.interrupt {
                if probe() {
                    return Err(RafterError::Cancelled);
                }
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.trim().is_empty() {
                continue;
            }
            if let Err(err) = self.parse_record(trimmed) {
                if err.is_recoverable() {
                    self.report(err.at_line(self.line_num));
                } else {
                    return Err(err);
                }
            }
        }
        for (handler, _) in &self.handlers {
            handler.borrow_mut().finish()?;
        }
        Ok(())
    }

    fn parse_record(&mut self, line: &str) -> Result<()> {
        // Early split: enough to reach FORMAT without touching sample columns.
        let head: Vec<&str> = line.splitn(FIELDS.len() + 1, '\t').collect();
        if head.len() < FIELDS.len() {
            return Err(RafterError::row_shape("the row is too short"));
        }

        let position = parse_position(head[CHROM], head[POS])?;
        let candidates: Vec<Variant> = head[ALT]
            .split(',')
            .map(|alt| Variant::new(position, head[REF], alt))
            .collect();
        let n_candidates = candidates.len() as u64;
        self.stats.add(Stat::Overall, n_candidates);

        if head[FILTER] != "PASS" {
            self.stats.add(Stat::NonPass, n_candidates);
            return Ok(());
        }
        if !self.filter.apply_position(&position) {
            self.stats.add(Stat::Banned, n_candidates);
            return Ok(());
        }

        let retained: Vec<Variant> = candidates
            .into_iter()
            .filter(|v| self.filter.apply_variant(v) && self.is_of_interest(v))
            .collect();
        if retained.is_empty() {
            return Ok(());
        }

        let tokens: Vec<&str> = line.split('\t').collect();
        let expected = FIELDS.len() + self.n_header_samples;
        if tokens.len() != expected {
            self.stats.add(Stat::Warning, retained.len() as u64);
            return Err(RafterError::row_shape(format!(
                "the row has {} columns whereas the header has {expected}",
                tokens.len()
            )));
        }

        let format = FormatReader::new(tokens[FORMAT])?;
        let mut alleles = Vec::with_capacity(self.filtered_samples.len());
        for (i, variant) in retained.iter().enumerate() {
            alleles.clear();
            for &col in &self.filtered_samples {
                alleles.push(format.parse(tokens[col], i + 1, &self.filter, &mut self.stats)?);
            }
            for (handler, _) in &self.handlers {
                handler.borrow_mut().process_variant(variant, &alleles)?;
            }
        }
        Ok(())
    }

    fn is_of_interest(&self, variant: &Variant) -> bool {
        self.handlers
            .iter()
            .any(|(handler, _)| handler.borrow().is_of_interest(variant))
    }

    fn report(&mut self, err: RafterError) {
        debug!(line = self.line_num, "skipping record: {err}");
        match &mut self.error_hook {
            Some(hook) => hook(&err),
            None => warn!("{err}"),
        }
    }
}

fn parse_position(chrom: &str, pos: &str) -> Result<Position> {
    let chromosome = chrom.parse()?;
    let pos = pos
        .parse()
        .map_err(|_| RafterError::format("can't read variant position"))?;
    Ok(Position::new(chromosome, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Allele, AlleleType};
    use std::io::Cursor;

    const HEADER: &str =
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n";

    /// Records every call it receives.
    #[derive(Default)]
    struct RecordingHandler {
        samples: Vec<String>,
        seen: Vec<(Variant, Vec<AlleleType>)>,
        finished: bool,
    }

    impl VariantsHandler for RecordingHandler {
        fn samples(&self) -> &[String] {
            &self.samples
        }

        fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()> {
            self.seen.push((
                variant.clone(),
                alleles.iter().map(|a| a.allele_type()).collect(),
            ));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn parser_for(body: &str, filter: VcfFilter) -> (VcfParser<Cursor<String>>, Rc<RefCell<RecordingHandler>>) {
        let text = format!("##fileformat=VCFv4.2\n{HEADER}{body}");
        let mut parser = VcfParser::new(Cursor::new(text), filter);
        parser.parse_header().unwrap();
        let handler = Rc::new(RefCell::new(RecordingHandler::default()));
        parser.register_handler(handler.clone(), 0);
        (parser, handler)
    }

    #[test]
    fn header_yields_samples() {
        let (parser, _) = parser_for("", VcfFilter::default());
        assert_eq!(parser.sample_names(), ["S1", "S2"]);
    }

    #[test]
    fn header_without_format_column_fails() {
        let text = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tS1\n";
        let mut parser = VcfParser::new(Cursor::new(text.to_string()), VcfFilter::default());
        match parser.parse_header() {
            Err(RafterError::Header { .. }) => {}
            other => panic!("expected header error, got {other:?}"),
        }
    }

    #[test]
    fn missing_header_fails() {
        let mut parser = VcfParser::new(
            Cursor::new("##meta-only\n".to_string()),
            VcfFilter::default(),
        );
        assert!(matches!(
            parser.parse_header(),
            Err(RafterError::Header { .. })
        ));
    }

    #[test]
    fn non_pass_records_are_skipped() {
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tA\tT\t50\tq10\t.\tGT\t0/1\t0/0\n",
            VcfFilter::default(),
        );
        parser.parse_genotypes().unwrap();
        assert_eq!(parser.stats().count(Stat::Overall), 1);
        assert_eq!(parser.stats().count(Stat::NonPass), 1);
        assert!(handler.borrow().seen.is_empty());
    }

    #[test]
    fn banned_positions_are_skipped() {
        let mut filter = VcfFilter::default();
        filter.add_banned_positions(["1:100".parse().unwrap()]);
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n\
             1\t200\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n",
            filter,
        );
        parser.parse_genotypes().unwrap();
        assert_eq!(parser.stats().count(Stat::Banned), 1);
        assert_eq!(handler.borrow().seen.len(), 1);
    }

    #[test]
    fn multiallelic_records_expand_in_order() {
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tC\tA,G\t50\tPASS\t.\tGT\t0/1\t0/2\n",
            VcfFilter::default(),
        );
        parser.parse_genotypes().unwrap();
        let seen = &handler.borrow().seen;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.to_string(), "1:100_C/A");
        assert_eq!(seen[1].0.to_string(), "1:100_C/G");
        // S1 carries alternate 1, S2 carries alternate 2
        assert_eq!(seen[0].1, vec![AlleleType::Het, AlleleType::Missing]);
        assert_eq!(seen[1].1, vec![AlleleType::Missing, AlleleType::Het]);
        assert_eq!(parser.stats().count(Stat::Overall), 2);
    }

    #[test]
    fn sample_filter_restricts_columns() {
        let mut filter = VcfFilter::default();
        filter.add_samples(["S2".to_string()]);
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t1/1\n",
            filter,
        );
        assert_eq!(parser.sample_names(), ["S2"]);
        parser.parse_genotypes().unwrap();
        assert_eq!(handler.borrow().seen[0].1, vec![AlleleType::Hom]);
    }

    #[test]
    fn column_mismatch_warns_and_continues() {
        let mut errors = Vec::new();
        let sink: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\n\
             1\t200\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n",
            VcfFilter::default(),
        );
        let sink_clone = sink.clone();
        parser.set_error_hook(move |err| sink_clone.borrow_mut().push(err.to_string()));
        parser.parse_genotypes().unwrap();
        errors.extend(sink.borrow().iter().cloned());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("line 3"), "got: {}", errors[0]);
        assert_eq!(parser.stats().count(Stat::Warning), 1);
        // the well-formed record still went through
        assert_eq!(handler.borrow().seen.len(), 1);
    }

    #[test]
    fn handlers_finish_after_stream_end() {
        let (mut parser, handler) = parser_for(
            "1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n",
            VcfFilter::default(),
        );
        parser.parse_genotypes().unwrap();
        assert!(handler.borrow().finished);
    }

    #[test]
    fn interrupt_aborts_with_cancelled() {
        let (mut parser, _) = parser_for(
            "1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n",
            VcfFilter::default(),
        );
        parser.set_interrupt(|| true);
        assert!(matches!(
            parser.parse_genotypes(),
            Err(RafterError::Cancelled)
        ));
    }

    #[test]
    fn uninterested_handlers_suppress_decoding() {
        /// Declines every variant.
        struct Bored;
        impl VariantsHandler for Bored {
            fn samples(&self) -> &[String] {
                &[]
            }
            fn is_of_interest(&self, _variant: &Variant) -> bool {
                false
            }
            fn process_variant(&mut self, _: &Variant, _: &[Allele]) -> Result<()> {
                panic!("should never be called");
            }
        }

        let text = format!(
            "{HEADER}1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n"
        );
        let mut parser = VcfParser::new(Cursor::new(text), VcfFilter::default());
        parser.parse_header().unwrap();
        parser.register_handler(Rc::new(RefCell::new(Bored)), 0);
        parser.parse_genotypes().unwrap();
        assert_eq!(parser.stats().count(Stat::Overall), 1);
    }

    #[test]
    fn handler_order_is_ascending_and_stable() {
        struct Tagger {
            tag: u8,
            log: Rc<RefCell<Vec<u8>>>,
        }
        impl VariantsHandler for Tagger {
            fn samples(&self) -> &[String] {
                &[]
            }
            fn process_variant(&mut self, _: &Variant, _: &[Allele]) -> Result<()> {
                self.log.borrow_mut().push(self.tag);
                Ok(())
            }
        }

        let log: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let text = format!("{HEADER}1\t100\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\t0/0\n");
        let mut parser = VcfParser::new(Cursor::new(text), VcfFilter::default());
        parser.parse_header().unwrap();
        for (tag, order) in [(1u8, 5), (2, 0), (3, 5)] {
            parser.register_handler(
                Rc::new(RefCell::new(Tagger { tag, log: log.clone() })),
                order,
            );
        }
        parser.parse_genotypes().unwrap();
        assert_eq!(*log.borrow(), vec![2, 1, 3]);
    }
}
