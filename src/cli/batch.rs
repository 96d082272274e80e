use super::ui;
use crate::core::{Conversion, ConversionService, ConvertError};
use anyhow::{Context, Result, bail};
use comfy_table::Cell;
use futures::future::join_all;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// One input line and how its conversion went.
pub struct BatchLine {
    pub line_no: usize,
    pub expression: String,
    pub outcome: Result<Conversion, ConvertError>,
}

/// Reads expressions, one per line. Blank lines and `#` comments are skipped.
pub fn read_expressions<R: BufRead>(reader: R) -> Result<Vec<(usize, String)>> {
    let mut expressions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        expressions.push((idx + 1, trimmed.to_string()));
    }
    Ok(expressions)
}

fn open(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open batch file: {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Converts every expression concurrently. All lines share the service's
/// rate cache, so lines with the same base currency cost one fetch.
pub async fn convert_all(
    service: &ConversionService,
    expressions: Vec<(usize, String)>,
) -> Vec<BatchLine> {
    let pb = ui::new_progress_bar(expressions.len() as u64);
    pb.set_message("Converting...");

    let futures = expressions.into_iter().map(|(line_no, expression)| {
        let pb = pb.clone();
        async move {
            let outcome = service.convert_text(&expression).await;
            pb.inc(1);
            BatchLine {
                line_no,
                expression,
                outcome,
            }
        }
    });

    let lines = join_all(futures).await;
    pb.finish_and_clear();
    lines
}

pub fn display_as_table(lines: &[BatchLine]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Line"),
        ui::header_cell("Input"),
        ui::header_cell("Result"),
        ui::header_cell("Rate"),
    ]);

    for line in lines {
        let mut row = vec![Cell::new(line.line_no), Cell::new(&line.expression)];
        match &line.outcome {
            Ok(conversion) => {
                row.push(ui::amount_cell(format!(
                    "{:.prec$} {}",
                    conversion.result,
                    conversion.request.to,
                    prec = conversion.precision as usize
                )));
                row.push(ui::amount_cell(conversion.rate.normalize().to_string()));
            }
            Err(e) => {
                row.push(ui::error_cell(&e.to_string()));
                row.push(Cell::new(""));
            }
        }
        table.add_row(row);
    }
    table.to_string()
}

pub async fn run(service: &ConversionService, path: &str) -> Result<()> {
    let expressions = read_expressions(open(path)?)?;
    if expressions.is_empty() {
        bail!("No expressions found in {path}");
    }

    let lines = convert_all(service, expressions).await;
    println!("{}", display_as_table(&lines));

    let failed = lines.iter().filter(|l| l.outcome.is_err()).count();
    if failed > 0 {
        bail!("{failed} of {} expressions failed", lines.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::converter::Converter;
    use crate::core::currency::{CurrencyCode, RateSource, RateTable};
    use crate::core::error::SourceError;
    use crate::core::parser::AmountParser;
    use crate::core::rates::{CachePolicy, RateCache};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch_table(&self, base: &CurrencyCode) -> Result<RateTable, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            match base.as_str() {
                "USD" => Ok(RateTable::from([
                    ("EUR".parse().unwrap(), "0.92".parse().unwrap()),
                    ("GBP".parse().unwrap(), "0.79".parse().unwrap()),
                ])),
                _ => Err(SourceError::NotFound(base.clone())),
            }
        }
    }

    #[test]
    fn test_read_expressions_skips_blanks_and_comments() {
        let input = "10 usd to eur\n\n# comment\n  5 usd in gbp  \n";
        let expressions = read_expressions(Cursor::new(input)).unwrap();
        assert_eq!(
            expressions,
            vec![
                (1, "10 usd to eur".to_string()),
                (4, "5 usd in gbp".to_string())
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_shares_one_fetch_per_base() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let rates = RateCache::new(
            Arc::new(MemoryStore::new()),
            source.clone(),
            CachePolicy::default(),
        );
        let service = ConversionService::new(
            AmountParser::new("EUR".parse().unwrap()),
            rates,
            Converter::default(),
        );

        let expressions = vec![
            (1, "10 usd".to_string()),
            (2, "20 usd to gbp".to_string()),
            (3, "1 usd to eur".to_string()),
            (4, "ten dollars".to_string()),
        ];
        let lines = convert_all(&service, expressions).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].outcome.as_ref().unwrap().result.to_string(), "9.20");
        assert_eq!(lines[1].outcome.as_ref().unwrap().result.to_string(), "15.80");
        assert!(lines[3].outcome.is_err());

        let table = display_as_table(&lines);
        assert!(table.contains("9.20 EUR"));
        assert!(table.contains("15.80 GBP"));
    }
}
