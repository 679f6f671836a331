//! Receipt printer.
//!
//! Writes `receipt-<transaction>.txt` (thermal text) and, when enabled,
//! `receipt-<transaction>.html` into the spool directory. A print failure
//! is the caller's to log; it never reaches the cart.

use std::path::{Path, PathBuf};
use tracing::info;

use scanpay_core::{Receipt, ReceiptFormat};

#[derive(Debug, Clone)]
pub struct ReceiptPrinter {
    output_dir: PathBuf,
    format: ReceiptFormat,
    html: bool,
}

impl ReceiptPrinter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReceiptFormat, html: bool) -> Self {
        ReceiptPrinter {
            output_dir: output_dir.into(),
            format,
            html,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> &ReceiptFormat {
        &self.format
    }

    /// Writes the receipt files and returns their paths.
    pub fn print(&self, receipt: &Receipt) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let stem = format!("receipt-{}", file_safe(&receipt.transaction_id.0));
        let mut written = Vec::with_capacity(2);

        let text_path = self.output_dir.join(format!("{}.txt", stem));
        std::fs::write(&text_path, receipt.render_text(&self.format))?;
        written.push(text_path);

        if self.html {
            let html_path = self.output_dir.join(format!("{}.html", stem));
            std::fs::write(&html_path, receipt.render_html(&self.format))?;
            written.push(html_path);
        }

        info!(transaction_id = %receipt.transaction_id, files = written.len(), "Receipt printed");
        Ok(written)
    }
}

/// Transaction ids come from the server; keep them out of path syntax.
fn file_safe(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() {
        "unknown".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanpay_core::{Cart, Money, PaymentMethod, Product, ProductId, TransactionId};

    fn receipt(id: &str) -> Receipt {
        let mut cart = Cart::new();
        cart.add_or_increment(&Product::new(ProductId(1), "A1", "Widget", Money::from_minor(100)))
            .unwrap();
        Receipt::from_snapshot(
            &cart.snapshot(),
            TransactionId(id.into()),
            PaymentMethod::Card,
            Utc::now(),
            "Corner Mart",
        )
    }

    #[test]
    fn test_writes_text_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let printer = ReceiptPrinter::new(dir.path().join("spool"), ReceiptFormat::default(), true);

        let files = printer.print(&receipt("T-9")).unwrap();

        assert_eq!(files.len(), 2);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.contains("T-9"));
        assert!(text.contains("Widget"));
        let html = std::fs::read_to_string(&files[1]).unwrap();
        assert!(html.contains("Store Receipt"));
    }

    #[test]
    fn test_text_only_and_safe_names() {
        let dir = tempfile::tempdir().unwrap();
        let printer = ReceiptPrinter::new(dir.path(), ReceiptFormat::default(), false);

        let files = printer.print(&receipt("../../etc/x")).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].parent().unwrap(), dir.path());
        assert_eq!(file_safe("a/b c"), "a_b_c");
    }
}
