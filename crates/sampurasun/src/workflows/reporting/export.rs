use super::domain::ReportRow;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub const EXPORT_HEADER: [&str; 6] = [
    "Nama Stakeholder",
    "Jenis",
    "Nusantara",
    "Mancanegara",
    "Okupansi",
    "Pengeluaran",
];

const DELIMITER: u8 = b',';
const TERMINATOR: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write export row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush export buffer: {0}")]
    Flush(String),
    #[error("export produced invalid utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Renders already-filtered rows as CSV text.
///
/// Fields containing the delimiter, a quote or a line break are quoted with
/// inner quotes doubled, so any RFC 4180 reader recovers them unchanged.
pub fn render_csv(rows: &[ReportRow]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(TERMINATOR))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADER)?;

    for row in rows {
        let figures = &row.report.figures;
        let record = [
            row.stakeholder_name.clone(),
            row.stakeholder_type.label().to_string(),
            figures.nusantara.to_string(),
            figures.mancanegara.to_string(),
            figures.occupancy_rate.to_string(),
            figures.average_spending.to_string(),
        ];
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Reader configured with the same conventions as [`render_csv`].
pub fn export_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(TERMINATOR))
        .has_headers(true)
        .from_reader(reader)
}
