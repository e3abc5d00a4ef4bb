//! Two dimensional gradient noise over a fixed permutation table

const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225,
    140, 36, 103, 30, 69, 142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148,
    247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219, 203, 117, 35, 11, 32,
    57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122,
    60, 211, 133, 230, 220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54,
    65, 25, 63, 161, 1, 216, 80, 73, 209, 76, 132, 187, 208, 89, 18, 169,
    200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173, 186, 3, 64,
    52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213,
    119, 248, 152, 2, 44, 154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9,
    129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232, 178, 185, 112, 104,
    218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162, 241,
    81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93,
    222, 114, 67, 29, 24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

/// The table repeated once, so `i` may go up to 511
fn p(i: usize) -> usize {
    PERMUTATION[i & 255] as usize
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: usize, x: f64) -> f64 {
    let h = hash & 15;
    let g = (1 + (h & 7)) as f64;
    if h & 8 != 0 {
        -g * x
    } else {
        g * x
    }
}

/// Deterministic noise value for the point `(x, y)`
pub fn perlin(x: f64, y: f64) -> f64 {
    let (fx, fy) = (x.floor(), y.floor());
    let xi = (fx as i64 & 255) as usize;
    let yi = (fy as i64 & 255) as usize;
    let (x, y) = (x - fx, y - fy);
    let (u, v) = (fade(x), fade(y));

    let a = p(xi) + yi;
    let b = p(xi + 1) + yi;

    lerp(
        v,
        lerp(u, grad(p(a), x), grad(p(b), x - 1.0)),
        lerp(u, grad(p(a + 1), x - 1.0), grad(p(b + 1), x - 1.0)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn lattice_points_are_zero() {
        assert_close(perlin(0.0, 0.0), 0.0);
        assert_close(perlin(1.0, 1.0), 0.0);
    }

    #[test]
    fn known_values() {
        assert_close(perlin(0.5, 0.5), -1.5);
        assert_close(perlin(3.7, 1.2), 0.6817067443199997);
        assert_close(perlin(-2.25, 7.5), 0.055908203125);
    }

    #[test]
    fn deterministic() {
        assert_eq!(perlin(12.34, 56.78), perlin(12.34, 56.78));
    }
}
