use core::ops::Mul;

use super::Vec3;

/// 4x4 float matrix, column-major.
///
/// Rows and columns are zero-based. Out-of-range indices panic.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    m: [f32; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Builds a matrix from raw column-major storage.
    #[inline]
    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    /// Builds a matrix from rows written the way they read on paper.
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        let mut out = Self { m: [0.0; 16] };
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                out.set(r, c, *v);
            }
        }
        out
    }

    /// Non-uniform scale.
    pub fn scale(s: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.set(0, 0, s.x);
        out.set(1, 1, s.y);
        out.set(2, 2, s.z);
        out
    }

    pub fn translation(t: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.set(0, 3, t.x);
        out.set(1, 3, t.y);
        out.set(2, 3, t.z);
        out
    }

    #[inline]
    fn index(row: usize, col: usize) -> usize {
        assert!(row < 4, "Mat4 row {row} out of range");
        assert!(col < 4, "Mat4 column {col} out of range");
        col * 4 + row
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[Self::index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.m[Self::index(row, col)] = value;
    }

    pub fn row(&self, row: usize) -> [f32; 4] {
        [self.get(row, 0), self.get(row, 1), self.get(row, 2), self.get(row, 3)]
    }

    pub fn col(&self, col: usize) -> [f32; 4] {
        [self.get(0, col), self.get(1, col), self.get(2, col), self.get(3, col)]
    }

    /// Raw column-major storage, ready for upload.
    #[inline]
    pub fn as_cols_array(&self) -> &[f32; 16] {
        &self.m
    }

    /// Transforms a point (w = 1) and drops the resulting w.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let x = self.get(0, 0) * p.x + self.get(0, 1) * p.y + self.get(0, 2) * p.z + self.get(0, 3);
        let y = self.get(1, 0) * p.x + self.get(1, 1) * p.y + self.get(1, 2) * p.z + self.get(1, 3);
        let z = self.get(2, 0) * p.x + self.get(2, 1) * p.y + self.get(2, 2) * p.z + self.get(2, 3);
        Vec3::new(x, y, z)
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    #[inline]
    fn mul(self, rhs: Mat4) -> Mat4 {
        multiply(&self, &rhs)
    }
}

/// `a * b` in the usual mathematical sense (apply `b` first).
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = Mat4 { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a.get(r, k) * b.get(k, c);
            }
            out.set(r, c, sum);
        }
    }
    out
}

pub fn transpose(m: &Mat4) -> Mat4 {
    let mut out = Mat4 { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            out.set(c, r, m.get(r, c));
        }
    }
    out
}

// ── cofactors ──────────────────────────────────────────────────────────────

fn minor3(m: &Mat4, skip_row: usize, skip_col: usize) -> f32 {
    let mut v = [0.0f32; 9];
    let mut i = 0;
    for r in (0..4).filter(|&r| r != skip_row) {
        for c in (0..4).filter(|&c| c != skip_col) {
            v[i] = m.get(r, c);
            i += 1;
        }
    }
    v[0] * (v[4] * v[8] - v[5] * v[7]) - v[1] * (v[3] * v[8] - v[5] * v[6])
        + v[2] * (v[3] * v[7] - v[4] * v[6])
}

fn cofactor(m: &Mat4, row: usize, col: usize) -> f32 {
    let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
    sign * minor3(m, row, col)
}

pub fn determinant(m: &Mat4) -> f32 {
    (0..4).map(|c| m.get(0, c) * cofactor(m, 0, c)).sum()
}

/// Inverse via the adjugate. `None` when the matrix is singular
/// (`|det| <= 1e-6`).
pub fn inverse(m: &Mat4) -> Option<Mat4> {
    let det = determinant(m);
    if det.abs() <= 1e-6 {
        return None;
    }

    let inv_det = 1.0 / det;
    let mut out = Mat4 { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            // adjugate is the transposed cofactor matrix
            out.set(c, r, cofactor(m, r, c) * inv_det);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &Mat4, b: &Mat4) -> bool {
        a.as_cols_array()
            .iter()
            .zip(b.as_cols_array())
            .all(|(x, y)| (x - y).abs() < 1e-5)
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn storage_is_column_major() {
        let m = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.as_cols_array()[12], 1.0);
        assert_eq!(m.as_cols_array()[13], 2.0);
        assert_eq!(m.as_cols_array()[14], 3.0);
        assert_eq!(m.get(0, 3), 1.0);
        assert_eq!(m.col(3), [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn from_rows_matches_get() {
        let m = Mat4::from_rows([
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ]);
        assert_eq!(m.row(1), [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(m.get(3, 0), 13.0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_row_panics() {
        let _ = Mat4::IDENTITY.get(4, 0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_col_panics() {
        let mut m = Mat4::IDENTITY;
        m.set(0, 4, 1.0);
    }

    // ── algebra ───────────────────────────────────────────────────────────

    #[test]
    fn multiply_applies_right_operand_first() {
        let t = Mat4::translation(Vec3::new(1.0, 0.0, 0.0));
        let s = Mat4::scale(Vec3::splat(2.0));
        let p = (t * s).transform_point(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn transpose_swaps_rows_and_cols() {
        let m = Mat4::translation(Vec3::new(4.0, 5.0, 6.0));
        let t = transpose(&m);
        assert_eq!(t.row(3), [4.0, 5.0, 6.0, 1.0]);
    }

    #[test]
    fn inverse_round_trips() {
        let m = Mat4::translation(Vec3::new(3.0, -2.0, 7.0)) * Mat4::scale(Vec3::new(2.0, 4.0, 0.5));
        let inv = inverse(&m).expect("invertible");
        assert!(approx(&(m * inv), &Mat4::IDENTITY));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Mat4::scale(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(determinant(&m), 0.0);
        assert!(inverse(&m).is_none());
    }
}
