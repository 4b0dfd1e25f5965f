use std::ops::Mul;

use crate::geometry::vec2::Vec2;

/// osu! playfield size in osu!pixels.
pub const PLAYFIELD_WIDTH: f64 = 512.0;
pub const PLAYFIELD_HEIGHT: f64 = 384.0;

/// Affine 2D transform stored as a row-major 3x3 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec2Transform {
    matrix: [[f64; 3]; 3],
}

impl Mul<Vec2Transform> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: Vec2Transform) -> Self::Output {
        let nom_x = rhs.matrix[0][0] * self.x + rhs.matrix[0][1] * self.y + rhs.matrix[0][2];
        let nom_y = rhs.matrix[1][0] * self.x + rhs.matrix[1][1] * self.y + rhs.matrix[1][2];
        Vec2 { x: nom_x, y: nom_y }
    }
}

/// Returns the transform that applies `left` first and `rhs` second.
pub fn merge(left: Vec2Transform, rhs: Vec2Transform) -> Vec2Transform {
    let mut result = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            result[i][j] = rhs.matrix[i][0] * left.matrix[0][j]
                + rhs.matrix[i][1] * left.matrix[1][j]
                + rhs.matrix[i][2] * left.matrix[2][j];
        }
    }
    Vec2Transform { matrix: result }
}

impl Vec2Transform {
    pub fn translate(t: Vec2) -> Self {
        Vec2Transform {
            matrix: [[1.0, 0.0, t.x], [0.0, 1.0, t.y], [0.0, 0.0, 1.0]],
        }
    }

    fn flip_around_axis(dir: Vec2) -> Self {
        let r2 = dir.len2();
        Vec2Transform {
            matrix: [
                [
                    2.0 * dir.x * dir.x / r2 - 1.0,
                    2.0 * dir.x * dir.y / r2,
                    0.0,
                ],
                [
                    2.0 * dir.x * dir.y / r2,
                    2.0 * dir.y * dir.y / r2 - 1.0,
                    0.0,
                ],
                [0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn flip_around_axis_line(points: [Vec2; 2]) -> Self {
        let dir = points[1] - points[0];
        Vec2Transform::transform_at_origin(Vec2Transform::flip_around_axis(dir), points[0])
    }

    pub fn transform_at_origin(transform: Vec2Transform, origin: Vec2) -> Self {
        merge(
            Vec2Transform::translate(-origin),
            merge(transform, Vec2Transform::translate(origin)),
        )
    }

    /// HardRock mirror: y -> PLAYFIELD_HEIGHT - y.
    pub fn mirror_playfield_vertically() -> Self {
        let mid = PLAYFIELD_HEIGHT / 2.0;
        Vec2Transform::flip_around_axis_line([
            Vec2::new(0.0, mid),
            Vec2::new(PLAYFIELD_WIDTH, mid),
        ])
    }
}
