//! # Receipt
//!
//! The receipt is built from the cart snapshot that was submitted, never
//! from the live cart, and rendered two ways:
//!
//! ```text
//! ┌────────────────────────────────────────┐    ┌──────────────────────────┐
//! │ render_text(): thermal paper           │    │ render_html(): printable │
//! │                                        │    │ page ("Store Receipt")   │
//! │            Corner Mart                 │    │ <table> Item Qty Price   │
//! │           Store Receipt                │    │ Total ... Grand Total    │
//! │ ------------------------------------   │    └──────────────────────────┘
//! │ Transaction: T-9                       │
//! │ Item              Qty   Price   Total  │
//! │ Widget              2    ₹100    ₹200  │
//! │ GRAND TOTAL                      ₹250  │
//! └────────────────────────────────────────┘
//! ```
//!
//! Rendering is pure; writing the result somewhere is the app's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::cart::CartSnapshot;
use crate::money::Money;
use crate::types::{PaymentMethod, TransactionId};
use crate::MIN_PAPER_WIDTH;

/// Formatting knobs for rendering.
#[derive(Debug, Clone)]
pub struct ReceiptFormat {
    pub currency_symbol: String,
    pub currency_decimals: u32,
    /// Characters per line on the text receipt.
    pub paper_width: usize,
}

impl Default for ReceiptFormat {
    fn default() -> Self {
        ReceiptFormat {
            currency_symbol: "₹".to_string(),
            currency_decimals: 0,
            paper_width: 42,
        }
    }
}

impl ReceiptFormat {
    fn money(&self, amount: Money) -> String {
        amount.format(&self.currency_symbol, self.currency_decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub name: String,
    pub qty: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub store_name: String,
    pub timestamp: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub items: Vec<ReceiptLine>,
    pub total: Money,
}

impl Receipt {
    /// Builds the receipt for a confirmed transaction.
    pub fn from_snapshot(
        snapshot: &CartSnapshot,
        transaction_id: TransactionId,
        payment_method: PaymentMethod,
        timestamp: DateTime<Utc>,
        store_name: impl Into<String>,
    ) -> Self {
        let items = snapshot
            .items
            .iter()
            .map(|item| ReceiptLine {
                name: item.name.clone(),
                qty: item.qty,
                unit_price: item.price,
                line_total: item.line_total(),
            })
            .collect();

        Receipt {
            transaction_id,
            store_name: store_name.into(),
            timestamp,
            payment_method,
            items,
            total: snapshot.total,
        }
    }

    pub fn render_text(&self, format: &ReceiptFormat) -> String {
        let width = format.paper_width.max(MIN_PAPER_WIDTH);
        let rule = "-".repeat(width);
        // qty(4) + price(9) + total(9) + separators(3)
        let name_width = width.saturating_sub(25).max(1);
        let mut out = String::new();

        let _ = writeln!(out, "{:^width$}", self.store_name, width = width);
        let _ = writeln!(out, "{:^width$}", "Store Receipt", width = width);
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Transaction: {}", self.transaction_id);
        let _ = writeln!(out, "Date: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Payment: {}", self.payment_method.label());
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "{:<nw$} {:>4} {:>9} {:>9}",
            "Item",
            "Qty",
            "Price",
            "Total",
            nw = name_width
        );

        for line in &self.items {
            let _ = writeln!(
                out,
                "{:<nw$} {:>4} {:>9} {:>9}",
                truncate(&line.name, name_width),
                line.qty,
                format.money(line.unit_price),
                format.money(line.line_total),
                nw = name_width
            );
        }

        let total = format.money(self.total);
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "{:<lw$}{:>9}",
            "GRAND TOTAL",
            total,
            lw = width.saturating_sub(9)
        );
        let _ = writeln!(out, "{:^width$}", "Thank you for shopping!", width = width);

        out
    }

    /// Self-contained printable HTML page.
    pub fn render_html(&self, format: &ReceiptFormat) -> String {
        let mut rows = String::new();
        for line in &self.items {
            let _ = write!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&line.name),
                line.qty,
                escape_html(&format.money(line.unit_price)),
                escape_html(&format.money(line.line_total)),
            );
        }

        format!(
            concat!(
                "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
                "<title>Receipt {id}</title>\n",
                "<style>body{{font-family:sans-serif;padding:20px}}",
                "table{{width:100%;border-collapse:collapse;margin-top:20px}}",
                "th,td{{border:1px solid #ccc;padding:8px;text-align:left}}",
                "th{{background-color:#f4f4f4}}",
                ".total{{font-weight:bold}}</style>\n",
                "</head>\n<body>\n",
                "<h2>Store Receipt</h2>\n",
                "<p>{store}</p>\n",
                "<p><strong>Transaction ID:</strong> {id}</p>\n",
                "<p><strong>Date:</strong> {date}</p>\n",
                "<p><strong>Payment:</strong> {method}</p>\n",
                "<table>\n<thead><tr><th>Item</th><th>Qty</th><th>Price</th><th>Total</th></tr></thead>\n",
                "<tbody>{rows}<tr><td colspan=\"3\" class=\"total\">Grand Total</td>",
                "<td class=\"total\">{total}</td></tr></tbody>\n</table>\n",
                "</body>\n</html>\n"
            ),
            id = escape_html(&self.transaction_id.0),
            store = escape_html(&self.store_name),
            date = self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            method = self.payment_method.label(),
            rows = rows,
            total = escape_html(&format.money(self.total)),
        )
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Cart;
    use crate::types::{Product, ProductId};
    use chrono::TimeZone;

    fn snapshot() -> CartSnapshot {
        let widget = Product::new(ProductId(1), "A1", "Widget", Money::from_minor(100));
        let gadget = Product::new(ProductId(2), "B2", "Gadget", Money::from_minor(50));
        let mut cart = Cart::new();
        cart.add_or_increment(&widget).unwrap();
        cart.add_or_increment(&widget).unwrap();
        cart.add_or_increment(&gadget).unwrap();
        cart.snapshot()
    }

    fn receipt() -> Receipt {
        Receipt::from_snapshot(
            &snapshot(),
            TransactionId("T-9".to_string()),
            PaymentMethod::Cash,
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            "Corner Mart",
        )
    }

    #[test]
    fn test_receipt_from_snapshot() {
        let receipt = receipt();
        assert_eq!(receipt.total, Money::from_minor(250));
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[0].line_total, Money::from_minor(200));
        assert_eq!(receipt.transaction_id.0, "T-9");
    }

    #[test]
    fn test_render_text_fits_paper() {
        let format = ReceiptFormat::default();
        let text = receipt().render_text(&format);

        assert!(text.contains("Transaction: T-9"));
        assert!(text.contains("Date: 2026-03-14 09:26:53 UTC"));
        assert!(text.contains("₹250"));
        assert!(text
            .lines()
            .all(|line| line.chars().count() <= format.paper_width));
    }

    #[test]
    fn test_render_text_on_narrowest_accepted_paper() {
        let format = ReceiptFormat {
            paper_width: MIN_PAPER_WIDTH,
            ..ReceiptFormat::default()
        };
        assert!(crate::validation::validate_paper_width(format.paper_width).is_ok());

        let text = receipt().render_text(&format);

        assert!(text.contains("GRAND TOTAL"));
        assert!(text
            .lines()
            .all(|line| line.chars().count() <= format.paper_width));
    }

    #[test]
    fn test_render_text_below_minimum_width_does_not_panic() {
        let format = ReceiptFormat {
            paper_width: 0,
            ..ReceiptFormat::default()
        };
        assert!(receipt().render_text(&format).contains("T-9"));
    }

    #[test]
    fn test_render_text_truncates_long_names() {
        let mut receipt = receipt();
        receipt.items[0].name = "An extraordinarily long product name for paper".to_string();
        let text = receipt.render_text(&ReceiptFormat::default());
        assert!(text.contains('…'));
    }

    #[test]
    fn test_render_html() {
        let mut receipt = receipt();
        receipt.items[1].name = "Salt & <Pepper>".to_string();
        let html = receipt.render_html(&ReceiptFormat::default());

        assert!(html.contains("<h2>Store Receipt</h2>"));
        assert!(html.contains("<strong>Transaction ID:</strong> T-9"));
        assert!(html.contains("Salt &amp; &lt;Pepper&gt;"));
        assert!(html.contains("Grand Total"));
        assert!(html.contains("₹250"));
    }
}
