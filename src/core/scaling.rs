use regex::Regex;
use std::sync::OnceLock;

fn leading_number() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9/.,]+)").ok()).as_ref()
}

fn mixed_number() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]+)\s+([0-9]+/[0-9]+)").ok()).as_ref()
}

fn number_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9/.,\-\s]+").ok()).as_ref()
}

fn parse_fraction(text: &str) -> Option<f64> {
    let (num, den) = text.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

/// Numeric value at the start of an ingredient quantity.
///
/// Accepts `2`, `1.5`, `1,5`, `1/2`, `1 1/2`, `2 dl`; a range such as `1-2` yields its lower bound.
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }

    if let Some(caps) = mixed_number().and_then(|re| re.captures(quantity)) {
        if let (Ok(whole), Some(fraction)) = (caps[1].parse::<f64>(), parse_fraction(&caps[2])) {
            return Some(whole + fraction);
        }
    }

    if let Some((low, _high)) = quantity.split_once('-') {
        if quantity.matches('-').count() == 1 {
            if let Ok(value) = low.trim().parse::<f64>() {
                return Some(value);
            }
        }
    }

    let numeric = leading_number()?.captures(quantity)?.get(1)?.as_str().replace(',', ".");
    if numeric.contains('/') {
        if let Some(value) = parse_fraction(&numeric) {
            return Some(value);
        }
    }
    numeric.parse().ok()
}

/// Everything after the leading number, e.g. `dl` for `2 dl`.
pub fn extract_unit(quantity: &str) -> String {
    let quantity = quantity.trim();
    match number_prefix() {
        Some(re) => re.replace(quantity, "").trim().to_string(),
        None => quantity.to_string(),
    }
}

const COMMON_FRACTIONS: [(f64, &str); 6] = [
    (0.125, "1/8"),
    (0.25, "1/4"),
    (0.333, "1/3"),
    (0.5, "1/2"),
    (0.667, "2/3"),
    (0.75, "3/4"),
];

pub fn format_number(value: f64) -> String {
    if value < 0.01 {
        return "0".to_string();
    }
    if let Some((_, text)) = COMMON_FRACTIONS
        .iter()
        .find(|(fraction, _)| (value - fraction).abs() < 0.01)
    {
        return text.to_string();
    }
    if (value - value.round()).abs() < 0.01 {
        return format!("{}", value.round() as i64);
    }
    let text = format!("{:.1}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Scaled quantity with its unit; unparseable or zero quantities come back unchanged.
pub fn scale_quantity(quantity: &str, factor: f64) -> String {
    let Some(parsed) = parse_quantity(quantity) else {
        return quantity.to_string();
    };
    if parsed == 0.0 {
        return quantity.to_string();
    }

    let formatted = format_number(parsed * factor);
    match extract_unit(quantity) {
        unit if unit.is_empty() => formatted,
        unit => format!("{} {}", formatted, unit),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleOption {
    pub factor: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalingOptions {
    pub options: Vec<ScaleOption>,
    pub default_index: usize,
    pub prompt: &'static str,
}

const FREE_SCALE_FACTORS: [f64; 12] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 12.0];

/// Target servings 1..=12 when the recipe's servings are a whole number, else ¼x to 12x.
pub fn scaling_options(servings: Option<&str>) -> ScalingOptions {
    let original = servings
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&n| n > 0);

    match original {
        Some(original) => {
            let mut default_index = 0;
            let options = (1..=12u32)
                .enumerate()
                .map(|(index, target)| {
                    let mut label = format!("{} servings", target);
                    if target == original {
                        label.push_str(" (original)");
                        default_index = index;
                    }
                    ScaleOption {
                        factor: f64::from(target) / f64::from(original),
                        label,
                    }
                })
                .collect();
            ScalingOptions {
                options,
                default_index,
                prompt: "Scale to:",
            }
        }
        None => ScalingOptions {
            options: FREE_SCALE_FACTORS
                .iter()
                .map(|&factor| ScaleOption {
                    factor,
                    label: if factor == 1.0 {
                        "1x (original)".to_string()
                    } else if factor < 1.0 {
                        format!("{}x", format_number(factor))
                    } else {
                        format!("{}x", factor as u32)
                    },
                })
                .collect(),
            default_index: 3,
            prompt: "Scale recipe:",
        },
    }
}
