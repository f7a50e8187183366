use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::{Error, NamedQuery, QueryId, Result};

const SHEET_NAME: &str = "Tags";
const WEIGHT_FORMAT: &str = "0.000";

/// One emitted report row with its navigation already resolved.
#[derive(Debug)]
pub(crate) struct PlannedRow {
	pub(crate) file_id: String,
	pub(crate) display_name: String,
	pub(crate) relative_path: String,
	pub(crate) total: f64,
	pub(crate) weights: Vec<(QueryId, f64)>,
	pub(crate) file_link: Option<String>,
	pub(crate) cell_links: Vec<(QueryId, String)>,
}
impl PlannedRow {
	fn weight(&self, query_id: QueryId) -> Option<f64> {
		self.weights.iter().find(|(id, _)| *id == query_id).map(|(_, weight)| *weight)
	}

	fn cell_link(&self, query_id: QueryId) -> Option<&str> {
		self.cell_links.iter().find(|(id, _)| *id == query_id).map(|(_, link)| link.as_str())
	}
}

/// Lays out the sheet and saves it to `output`.
pub(crate) fn save(output: &Path, queries: &[NamedQuery], rows: &[PlannedRow]) -> Result<()> {
	let mut workbook = Workbook::new();
	let header = Format::new().set_bold();
	let number = Format::new().set_num_format(WEIGHT_FORMAT);
	let total_col = column(queries.len() + 2)?;
	let worksheet = workbook.add_worksheet();

	worksheet.set_name(SHEET_NAME)?;
	worksheet.set_freeze_panes(1, 0)?;
	worksheet.write_string_with_format(0, 0, "File", &header)?;
	worksheet.write_string_with_format(0, 1, "Path", &header)?;

	for (idx, query) in queries.iter().enumerate() {
		worksheet.write_string_with_format(0, column(idx + 2)?, &query.display_name, &header)?;
	}

	worksheet.write_string_with_format(0, total_col, "Total", &header)?;

	for (idx, row) in rows.iter().enumerate() {
		let row_num = u32::try_from(idx + 1)
			.map_err(|_| Error::Report { message: "Report row index overflowed.".to_string() })?;
		let label = if row.display_name.is_empty() { &row.file_id } else { &row.display_name };

		match &row.file_link {
			Some(link) => {
				worksheet.write_url_with_text(row_num, 0, link.as_str(), label.as_str())?;
			},
			None => {
				worksheet.write_string(row_num, 0, label)?;
			},
		}

		worksheet.write_string(row_num, 1, &row.relative_path)?;

		for (idx, query) in queries.iter().enumerate() {
			let Some(weight) = row.weight(query.id) else {
				continue;
			};
			let col = column(idx + 2)?;

			write_weight(worksheet, row_num, col, weight, row.cell_link(query.id), &number)?;
		}

		worksheet.write_number_with_format(row_num, total_col, row.total, &number)?;
	}

	workbook.save(output)?;

	Ok(())
}

fn write_weight(
	worksheet: &mut Worksheet,
	row: u32,
	col: u16,
	weight: f64,
	link: Option<&str>,
	number: &Format,
) -> Result<()> {
	match link {
		Some(link) => {
			worksheet.write_url_with_text(row, col, link, format!("{weight:.3}"))?;
		},
		None => {
			worksheet.write_number_with_format(row, col, weight, number)?;
		},
	}

	Ok(())
}

fn column(idx: usize) -> Result<u16> {
	u16::try_from(idx).map_err(|_| Error::Report {
		message: format!("Report needs {} columns, more than a worksheet holds.", idx + 1),
	})
}
