use std::ops::Mul;

use crate::geometry::vec2::Vec2;

/// Row-major 4x4 matrix acting on column vectors, `m[row][col]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Self::Output {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Mat4 { m }
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// OpenGL-style orthographic projection.
    pub fn ortho(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Self {
        Mat4 {
            m: [
                [2.0 / (right - left), 0.0, 0.0, -(right + left) / (right - left)],
                [0.0, 2.0 / (top - bottom), 0.0, -(top + bottom) / (top - bottom)],
                [0.0, 0.0, -2.0 / (far - near), -(far + near) / (far - near)],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn translate(x: f64, y: f64, z: f64) -> Self {
        let mut out = Mat4::IDENTITY;
        out.m[0][3] = x;
        out.m[1][3] = y;
        out.m[2][3] = z;
        out
    }

    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        let mut out = Mat4::IDENTITY;
        out.m[0][0] = x;
        out.m[1][1] = y;
        out.m[2][2] = z;
        out
    }

    pub fn rotation_z(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let mut out = Mat4::IDENTITY;
        out.m[0][0] = cos;
        out.m[0][1] = -sin;
        out.m[1][0] = sin;
        out.m[1][1] = cos;
        out
    }

    pub fn transform(&self, v: [f64; 4]) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (i, cell) in out.iter_mut().enumerate() {
            *cell = (0..4).map(|k| self.m[i][k] * v[k]).sum();
        }
        out
    }

    /// Transforms `(p.x, p.y, 0, 1)` and returns the perspective-divided xy.
    pub fn project(&self, p: Vec2) -> Vec2 {
        let [x, y, _, w] = self.transform([p.x, p.y, 0.0, 1.0]);
        Vec2 { x: x / w, y: y / w }
    }

    /// Gauss-Jordan inverse, `None` for singular matrices.
    pub fn inverse(&self) -> Option<Mat4> {
        let mut a = self.m;
        let mut inv = Mat4::IDENTITY.m;

        for col in 0..4 {
            let pivot = (col..4).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
            if a[pivot][col].abs() < 1e-12 {
                return None;
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let p = a[col][col];
            for j in 0..4 {
                a[col][j] /= p;
                inv[col][j] /= p;
            }

            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..4 {
                    a[row][j] -= factor * a[col][j];
                    inv[row][j] -= factor * inv[col][j];
                }
            }
        }

        Some(Mat4 { m: inv })
    }

    /// Column-major f32 layout, as WGSL `mat4x4<f32>` expects.
    pub fn to_cols_f32(&self) -> [[f32; 4]; 4] {
        let mut cols = [[0.0f32; 4]; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            for (r, cell) in col.iter_mut().enumerate() {
                *cell = self.m[r][c] as f32;
            }
        }
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(a: &Mat4, b: &Mat4) {
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (a.m[i][j] - b.m[i][j]).abs() < 1e-9,
                    "mismatch at ({i},{j}): {} vs {}",
                    a.m[i][j],
                    b.m[i][j]
                );
            }
        }
    }

    #[test]
    fn ortho_maps_rect_corners_to_clip_corners() {
        let proj = Mat4::ortho(0.0, 640.0, 480.0, 0.0, 1.0, -1.0);
        let top_left = proj.project(Vec2::new(0.0, 0.0));
        let bottom_right = proj.project(Vec2::new(640.0, 480.0));
        assert!((top_left.x + 1.0).abs() < 1e-9 && (top_left.y - 1.0).abs() < 1e-9);
        assert!((bottom_right.x - 1.0).abs() < 1e-9 && (bottom_right.y + 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_undoes_rotated_projection() {
        let view = Mat4::rotation_z(0.7) * Mat4::translate(-10.0, 25.0, 0.0);
        let proj = Mat4::ortho(0.0, 800.0, 600.0, 0.0, 1.0, -1.0) * view;
        let inv = proj.inverse().expect("projection must be invertible");
        assert_mat_eq(&(proj * inv), &Mat4::IDENTITY);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Mat4::scale(1.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn columns_are_transposed_rows() {
        let t = Mat4::translate(3.0, 4.0, 5.0).to_cols_f32();
        assert_eq!(t[3], [3.0, 4.0, 5.0, 1.0]);
    }
}
