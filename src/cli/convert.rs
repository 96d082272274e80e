use super::ui;
use crate::core::{Conversion, ConversionService, ConvertError};
use anyhow::Result;

impl Conversion {
    pub fn display(&self) -> String {
        format!(
            "{}\n{}",
            ui::style_text(&self.describe(), ui::StyleType::Result),
            ui::style_text(&self.describe_rate(), ui::StyleType::Subtle)
        )
    }
}

/// Converts a single expression such as `10 usd to eur` and prints it.
pub async fn run(service: &ConversionService, expression: &str) -> Result<()> {
    // Parse up front so typos fail without a spinner flashing by
    let request = service
        .parser()
        .extract(expression)
        .map_err(ConvertError::from)?;

    let pb = ui::new_spinner(&format!("Fetching {} rates...", request.from));
    let result = service.convert(request).await;
    pb.finish_and_clear();

    println!("{}", result?.display());
    Ok(())
}
