use super::ListModelResponse;

const SIZE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Human-readable size using SI (power of 1000) units, e.g. `4.7 GB`.
///
/// Values below 10 of a unit keep one decimal place; larger ones are rounded.
pub fn format_size(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if value < 10.0 {
        format!("{:.1} {}", value, SIZE_UNITS[unit])
    } else {
        format!("{:.0} {}", value, SIZE_UNITS[unit])
    }
}

/// One-line summary shown under a model's name in the chooser.
pub fn describe_model(model: &ListModelResponse) -> String {
    format!(
        "({}) {} {} {}",
        format_size(model.size),
        model.details.family,
        model.details.parameter_size,
        model.details.quantization_level
    )
}

pub fn find_model_index(models: &[ListModelResponse], name: &str) -> Option<usize> {
    models.iter().position(|model| model.name == name)
}
