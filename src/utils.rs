use rand::{rngs::OsRng, TryRngCore};

/// Окно результатов, которое отдают площадки контента
pub const RESULT_WINDOW: u64 = 10_000;

/// Генерация короткого ID (base62) заданной длины
pub fn gen_short_id(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut buf = vec![0u8; len];

    let mut rng = OsRng;
    let _ = rng.try_fill_bytes(&mut buf);

    buf.iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Ограничивает `total` окном в 10000 результатов.
///
/// Считается в целых числах: `((10000 - ps) / ps + 1) * ps`, чтобы число
/// страниц не "прыгало", когда площадка отдаёт плавающий total.
pub fn cap_total(upstream_total: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    if page_size >= RESULT_WINDOW {
        return upstream_total.min(page_size);
    }
    let max_pages = (RESULT_WINDOW - page_size) / page_size + 1;
    upstream_total.min(max_pages * page_size)
}

/// Количество страниц (минимум одна)
pub fn total_pages(total: u64, per_page: u32) -> u64 {
    let per_page = u64::from(per_page.max(1));
    total.div_ceil(per_page).max(1)
}

/// Смещение первой записи страницы (страницы нумеруются с 1)
pub fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(page_size)
}

/// Сравнивает строки вида "1.20.4" по числовым компонентам
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |s: &str| -> Vec<u64> { s.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    let (va, vb) = (parse(a), parse(b));
    let len = va.len().max(vb.len());
    for i in 0..len {
        let x = va.get(i).copied().unwrap_or(0);
        let y = vb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Обрезает тело ответа для логов
pub fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_gen_short_id_alphabet() {
        let id = gen_short_id(16);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_cap_total_never_exceeds_window() {
        assert_eq!(cap_total(50_000, 20), 10_000);
        // 10000 не делится на 30: окно 333 страницы по 30
        assert_eq!(cap_total(50_000, 30), 9_990);
        assert_eq!(cap_total(42, 20), 42);
        assert_eq!(cap_total(0, 20), 0);
        for ps in [1, 7, 13, 25, 49, 50] {
            assert!(cap_total(u64::MAX, ps) <= RESULT_WINDOW);
        }
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 25), 50);
        assert_eq!(page_offset(0, 25), 0);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.20.4", "1.20"), Ordering::Greater);
        assert_eq!(compare_versions("1.9", "1.13"), Ordering::Less);
        assert_eq!(compare_versions("1.21", "1.21.0"), Ordering::Equal);
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let body = "ж".repeat(300);
        assert_eq!(excerpt(&body).chars().count(), 200);
        assert_eq!(excerpt("short"), "short");
    }
}
