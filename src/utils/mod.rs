const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Download name for a rendition, safe to put inside a quoted `filename=` parameter.
pub fn attachment_filename(rendition_id: &str, container: &str) -> String {
    format!("video.{}.{}", sanitize(rendition_id), sanitize(container))
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '"' | '\\' | '/' | ';' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect()
}
