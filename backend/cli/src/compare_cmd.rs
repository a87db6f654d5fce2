//! `ocrbench compare` and `ocrbench providers`.

use std::path::Path;

use anyhow::{Context, Result};

use ocrbench_core::{ComparisonResponse, Comparator, ProviderKind, SheetInfo};
use ocrbench_sheets::{ComparisonRecord, SheetService};

use crate::output::{fail, ok, render_table, truncate};

/// Run both providers on a local image and print the comparison.
pub async fn run(
    comparator: &Comparator,
    sheets: Option<Result<&SheetService, String>>,
    image: &Path,
    sheet_name: &str,
    json: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.display().to_string());

    let response = comparator.compare(&bytes).await;

    let sheet_info = match sheets {
        None => SheetInfo::not_requested(sheet_name),
        Some(Ok(service)) => {
            let record = ComparisonRecord::from_response(&name, bytes.len(), &response);
            service.save_comparison(sheet_name, &record).await
        }
        Some(Err(reason)) => SheetInfo::failed(sheet_name, reason),
    };
    let response = response.with_sheet_info(sheet_info);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_summary(&name, &response);
    }
    Ok(())
}

fn print_summary(name: &str, response: &ComparisonResponse) {
    let rows: Vec<Vec<String>> = ProviderKind::ALL
        .iter()
        .map(|kind| {
            let result = response.result(*kind);
            vec![
                kind.display_name().to_string(),
                if result.success { ok("yes") } else { fail("no") },
                result.text_len().to_string(),
                format!("{} ms", result.process_time),
                match &result.error {
                    Some(e) => fail(&truncate(e, 48)),
                    None => truncate(&result.full_text, 48),
                },
            ]
        })
        .collect();

    println!("\n{name}\n");
    print!(
        "{}",
        render_table(&["Provider", "Success", "Chars", "Time", "Text"], &rows)
    );
    println!(
        "\nSimilarity: {:.2}%\n{}",
        response.comparison.similarity_score,
        response.comparison.recommendation.message()
    );

    if let Some(info) = &response.sheet_info {
        match (&info.error, &info.message) {
            (Some(error), _) => println!("Sheet '{}': {}", info.sheet_name, fail(error)),
            (None, Some(message)) if info.saved => println!(
                "Sheet '{}': {} ({})",
                info.sheet_name,
                ok(message),
                info.spreadsheet_url.as_deref().unwrap_or("")
            ),
            _ => {}
        }
    }
}

/// Static provider descriptors.
pub fn providers() {
    let rows: Vec<Vec<String>> = ProviderKind::ALL
        .iter()
        .map(|kind| vec![kind.as_str().to_string(), kind.description().to_string()])
        .collect();
    print!("{}", render_table(&["Name", "Description"], &rows));
}
