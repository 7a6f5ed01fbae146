//! Reader for the annotated CSV returned by the Flux query endpoint.
//!
//! A response holds one or more result chunks separated by blank lines. Each
//! chunk may start with `#datatype`/`#group`/`#default` annotation rows,
//! followed by a header row and the data rows.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ResultChunk {
    pub(super) headers: Vec<String>,
    pub(super) rows: Vec<Vec<String>>,
}

impl ResultChunk {
    pub(super) fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }
}

pub(super) fn parse_chunks(body: &str) -> Result<Vec<ResultChunk>, csv::Error> {
    let mut chunks = Vec::new();
    for block in split_blocks(body) {
        if let Some(chunk) = parse_block(&block)? {
            chunks.push(chunk);
        }
    }
    Ok(chunks)
}

/// Splits on blank lines, except those inside a quoted cell.
fn split_blocks(body: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for line in body.lines() {
        if !in_quotes && line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        // An escaped `""` flips twice, so counting quotes is enough.
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_block(block: &str) -> Result<Option<ResultChunk>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(block.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Ok(None);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Tables sharing a chunk can repeat the header row.
        if record.iter().eq(headers.iter().map(String::as_str)) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Some(ResultChunk { headers, rows }))
}
