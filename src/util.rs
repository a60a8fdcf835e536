// Display helpers shared by the page controllers.

/// Brazilian currency display: `R$ 1.234,56`. Values are stored as REAL,
/// so rounding to cents happens here, at the display edge.
pub fn format_currency(valor: f64) -> String {
    let negativo = valor < 0.0;
    let centavos = (valor.abs() * 100.0).round() as i64;
    let inteiro = centavos / 100;
    let resto = centavos % 100;

    let digits = inteiro.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    format!(
        "{}R$ {},{:02}",
        if negativo { "-" } else { "" },
        grouped,
        resto
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(1234.5), "R$ 1.234,50");
        assert_eq!(format_currency(125000.5), "R$ 125.000,50");
        assert_eq!(format_currency(1000000.0), "R$ 1.000.000,00");
        assert_eq!(format_currency(-42.07), "-R$ 42,07");
    }

    #[test]
    fn test_format_currency_rounds_to_cents() {
        assert_eq!(format_currency(0.005), "R$ 0,01");
        assert_eq!(format_currency(99.999), "R$ 100,00");
    }
}
