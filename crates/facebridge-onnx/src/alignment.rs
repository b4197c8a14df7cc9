//! Face alignment and cropping on packed BGR24 frames.
//!
//! Recognition crops use a 4-DOF similarity transform onto the five
//! InsightFace reference landmarks. Attribute crops are axis-aligned squares
//! scaled around the face box.

use crate::types::BoundingBox;
use facebridge_core::PixelBuffer;

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: usize = 112;
const CHANNELS: usize = 3;

/// Estimate a 2×3 similarity transform (4-DOF: scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations for A * [a, b, tx, ty]^T = B, two rows per point:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for ((sx, sy), (dx, dy)) in src.iter().copied().zip(dst.iter().copied()) {
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let [a, b, tx, ty] = solve_4x4(&ata, &atb);
    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&ata[i * 4..i * 4 + 4]);
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let max_row = (col..4)
            .max_by(|&r1, &r2| {
                m[r1][col]
                    .abs()
                    .partial_cmp(&m[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    x
}

/// Apply a 2×3 similarity warp to produce a square BGR24 output.
///
/// Uses bilinear interpolation. Out-of-bounds pixels are black.
fn warp_affine(image: &PixelBuffer, matrix: &[f32; 6], out_size: usize) -> Vec<u8> {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);
    let (src_width, src_height) = (image.width() as i32, image.height() as i32);
    let frame = image.data();

    let mut output = vec![0u8; out_size * out_size * CHANNELS];

    // Invert the 2x2 part: M = [[a, -b], [b, a]], det = a^2 + b^2
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return output;
    }
    let ia = a / det;
    let ib = b / det;

    for oy in 0..out_size {
        for ox in 0..out_size {
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for c in 0..CHANNELS {
                let sample = |x: i32, y: i32| -> f32 {
                    if x >= 0 && x < src_width && y >= 0 && y < src_height {
                        frame[(y as usize * src_width as usize + x as usize) * CHANNELS + c] as f32
                    } else {
                        0.0
                    }
                };

                let val = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1) * fx * fy;

                output[(oy * out_size + ox) * CHANNELS + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

/// Align a detected face to a canonical 112×112 BGR crop.
pub fn align_face(image: &PixelBuffer, landmarks: &[(f32, f32); 5]) -> Vec<u8> {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(image, &matrix, ALIGNED_SIZE)
}

/// Approximate landmarks for a box that came without them, placing the
/// reference layout over the box.
pub fn landmarks_from_box(bbox: &BoundingBox) -> [(f32, f32); 5] {
    let size = ALIGNED_SIZE as f32;
    REFERENCE_LANDMARKS_112.map(|(rx, ry)| {
        (
            bbox.x + rx / size * bbox.width,
            bbox.y + ry / size * bbox.height,
        )
    })
}

/// Square crop of side `scale * max(w, h)` centred on the box, resized to
/// `out_size`×`out_size`.
pub fn crop_scaled(image: &PixelBuffer, bbox: &BoundingBox, scale: f32, out_size: usize) -> Vec<u8> {
    let side = bbox.width.max(bbox.height) * scale;
    if side <= 0.0 {
        return vec![0u8; out_size * out_size * CHANNELS];
    }
    let s = out_size as f32 / side;
    let (cx, cy) = bbox.center();
    let half = out_size as f32 / 2.0;
    let matrix = [s, 0.0, half - cx * s, 0.0, s, half - cy * s];
    warp_affine(image, &matrix, out_size)
}

/// Horizontal mirror of a square packed 3-channel crop.
pub fn mirror(crop: &[u8], size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(crop.len());
    for row in crop.chunks_exact(size * CHANNELS) {
        for px in row.chunks_exact(CHANNELS).rev() {
            out.extend_from_slice(px);
        }
    }
    out
}
