/// Format a count with comma thousands separators.
pub fn format_count(value: u64) -> String {
    let mut out = String::with_capacity(26);
    write_count(&mut out, value);
    out
}

pub fn write_count(buf: &mut String, value: u64) {
    buf.clear();
    push_grouped(buf, value);
}

/// Signed delta annotation, e.g. `+1,204` or `-3`. Zero renders empty.
pub fn format_delta(delta: i64) -> String {
    let mut out = String::new();
    match delta.signum() {
        1 => out.push('+'),
        -1 => out.push('-'),
        _ => return out,
    }
    push_grouped(&mut out, delta.unsigned_abs());
    out
}

fn push_grouped(buf: &mut String, value: u64) {
    let digits = value.to_string();
    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            buf.push(',');
        }
        buf.push(ch);
    }
}
