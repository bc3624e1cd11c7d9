use std::fmt::Write;

const DATA_INDENT: &str = "          ";

/// Accumulates keyword text. Headers are indented by nesting depth,
/// data rows by a fixed ten columns.
#[derive(Debug, Default)]
pub struct KeywordWriter {
    out: String,
}

impl KeywordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("   ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn row<I, T>(&mut self, fields: I)
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Display,
    {
        self.out.push_str(DATA_INDENT);
        let mut first = true;
        for field in fields {
            if !first {
                self.out.push(' ');
            }
            first = false;
            let _ = write!(self.out, "{field}");
        }
        self.out.push('\n');
    }

    /// Writes ids `per_row` at a time.
    pub fn id_rows(&mut self, ids: &[i32], per_row: usize) {
        for chunk in ids.chunks(per_row.max(1)) {
            self.row(chunk.iter().map(|id| format!("{id:>8}")));
        }
    }

    pub fn coordinate_row(&mut self, id: i32, coords: [f64; 3]) {
        self.row([
            format!("{id:>8}"),
            scientific(coords[0]),
            scientific(coords[1]),
            scientific(coords[2]),
        ]);
    }

    pub fn comment_end(&mut self) {
        self.out.push_str("!\n");
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Fortran-style `1.000000E+00` formatting.
pub fn scientific(x: f64) -> String {
    let raw = format!("{x:.6E}");
    match raw.split_once('E') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(e) => {
                let sign = if e < 0 { '-' } else { '+' };
                let padded = format!("{mantissa}E{sign}{:02}", e.abs());
                if mantissa.starts_with('-') {
                    padded
                } else {
                    format!(" {padded}")
                }
            }
            Err(_) => raw,
        },
        None => raw,
    }
}
