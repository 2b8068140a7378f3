//! Sequential batch runs.
//!
//! One runner holds one resolver and one cell info extractor for the whole
//! run, so the resolution cache is shared across every request.

use bomgraph_engine::engine::{
    CellInfoExtractor, CellProvider, Classifier, ExtractionStats, FormulaParser, Reference,
    Resolver, ResolverOptions,
};

use crate::config::Config;
use crate::storage::{BatchRequest, FileIndex, ProductMapper, WorkbookProvider};

const PROGRESS_EVERY: usize = 10;

pub struct BatchRunner<P, C> {
    resolver: Resolver,
    extractor: CellInfoExtractor<P, C>,
}

impl<P: CellProvider, C: Classifier> BatchRunner<P, C> {
    pub fn new(options: ResolverOptions, extractor: CellInfoExtractor<P, C>) -> Self {
        BatchRunner {
            resolver: Resolver::new(options),
            extractor,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn stats(&self) -> &ExtractionStats {
        self.extractor.stats()
    }

    pub fn resolve(&mut self, request: &BatchRequest) -> Reference {
        tracing::debug!(id = %request.address.id(), product = ?request.product_id, "resolving request");
        self.resolver.resolve_address(
            &request.address,
            request.product_id.as_deref(),
            &mut self.extractor,
        )
    }

    /// Resolve every request in order, one tree per request.
    pub fn run(&mut self, requests: &[BatchRequest]) -> Vec<Reference> {
        let total = requests.len();
        tracing::info!(total, "starting batch");
        let mut results = Vec::with_capacity(total);
        for (i, request) in requests.iter().enumerate() {
            results.push(self.resolve(request));
            let done = i + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                tracing::info!(
                    done,
                    total,
                    percent = %format!("{:.1}", done as f64 * 100.0 / total as f64),
                    "batch progress"
                );
            }
        }
        let stats = self.stats();
        tracing::info!(
            cells = stats.cells,
            formulas = stats.formulas,
            multiplications = stats.multiplications,
            divisions = stats.divisions,
            lookup_errors = stats.lookup_errors,
            cached = self.resolver.cache_len(),
            "batch finished"
        );
        results
    }
}

impl BatchRunner<WorkbookProvider, ProductMapper> {
    /// Runner over the workbooks in `index`, configured from `config`.
    pub fn from_config(config: &Config, index: FileIndex, mapper: ProductMapper) -> Self {
        let provider = WorkbookProvider::new(index, config.workbooks.cache_capacity);
        let parser = FormulaParser::new(&config.cleaner, &config.extractor);
        let extractor =
            CellInfoExtractor::new(provider, mapper, parser).with_aliases(config.aliases.clone());
        BatchRunner::new(config.resolver.clone(), extractor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bomgraph_engine::engine::{CellAddress, CellValue, RawCell};
    use bomgraph_engine::error::{LookupError, Result as LookupResult};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Cells {
        cells: HashMap<String, RawCell>,
    }

    impl Cells {
        fn with(mut self, sheet: &str, cell: &str, formula: Option<&str>, value: f64) -> Self {
            self.cells.insert(
                CellAddress::new("kast.xlsx", sheet, cell).id(),
                RawCell {
                    formula: formula.map(str::to_string),
                    value: Some(CellValue::Number(value)),
                },
            );
            self
        }
    }

    impl CellProvider for Cells {
        fn read_cell(&mut self, address: &CellAddress) -> LookupResult<RawCell> {
            self.cells
                .get(&address.id())
                .cloned()
                .ok_or_else(|| LookupError::CellNotFound(address.cell.clone()))
        }
    }

    fn runner(cells: Cells) -> BatchRunner<Cells, ProductMapper> {
        let extractor = CellInfoExtractor::new(cells, ProductMapper::default(), FormulaParser::default());
        BatchRunner::new(ResolverOptions::default(), extractor)
    }

    #[test]
    fn test_run_shares_cache_between_requests() {
        let cells = Cells::default()
            .with("S", "A1", Some("=C1+D1"), 3.0)
            .with("S", "B1", Some("=C1*2"), 2.0)
            .with("S", "C1", None, 1.0)
            .with("S", "D1", None, 2.0);
        let mut runner = runner(cells);
        let requests = vec![
            BatchRequest::new(Some("P-1"), "kast.xlsx", "S", "A1"),
            BatchRequest::new(Some("P-2"), "kast.xlsx", "S", "B1"),
        ];
        let results = runner.run(&requests);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].product_id.as_deref(), Some("P-1"));
        assert_eq!(results[1].product_id.as_deref(), Some("P-2"));
        assert_eq!(results[1].references[0], results[0].references[0]);
        assert_eq!(runner.stats().cells, 4);
        assert_eq!(runner.resolver().cache_len(), 4);
    }

    #[test]
    fn test_missing_start_cell_gives_error_tree() {
        let mut runner = runner(Cells::default());
        let results = runner.run(&[BatchRequest::new(Some("P-9"), "kast.xlsx", "S", "Z9")]);
        assert_eq!(results[0].error.as_deref(), Some("Cell not found: Z9"));
        assert_eq!(results[0].product_id.as_deref(), Some("P-9"));
        assert_eq!(runner.stats().lookup_errors, 1);
    }
}
