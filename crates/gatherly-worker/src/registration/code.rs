use crate::util::random_u32;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Draw a 6-digit verification code uniformly from `100000..=999999`.
pub fn generate_code() -> String {
    draw_code(random_u32)
}

fn draw_code(mut next: impl FnMut() -> u32) -> String {
    let span = CODE_MAX - CODE_MIN + 1;
    // Reject the tail of the u32 range so the modulo stays unbiased.
    let zone = u32::MAX - (u32::MAX % span);
    loop {
        let n = next();
        if n < zone {
            return (CODE_MIN + n % span).to_string();
        }
    }
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}
