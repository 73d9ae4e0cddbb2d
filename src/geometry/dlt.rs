//! Direct linear fits on Hartley-normalized correspondences.

use super::{Correspondence, Transform2d};
use crate::util::{KeyMatchError, KeyMatchResult};
use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, SVector, Vector3};

type Row9 = SVector<f64, 9>;

/// Relative singular-value floor below which a fit is rank deficient.
const RANK_EPS: f64 = 1e-12;

/// Centers points on their centroid and scales the mean distance to √2.
fn normalize_points(
    pts: impl Iterator<Item = [f64; 2]> + Clone,
) -> KeyMatchResult<Matrix3<f64>> {
    let n = pts.clone().count() as f64;
    let (sx, sy) = pts.clone().fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
    let (mx, my) = (sx / n, sy / n);
    let mean_dist = pts.map(|[x, y]| (x - mx).hypot(y - my)).sum::<f64>() / n;
    if !(mean_dist > 1e-12) {
        return Err(KeyMatchError::DegenerateFit {
            reason: "coincident points",
        });
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(s, 0.0, -s * mx, 0.0, s, -s * my, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, [x, y]: [f64; 2]) -> [f64; 2] {
    let v = t * Vector3::new(x, y, 1.0);
    [v[0], v[1]]
}

struct Normalized {
    src: Vec<[f64; 2]>,
    dst: Vec<[f64; 2]>,
    t_src: Matrix3<f64>,
    t_dst_inv: Matrix3<f64>,
}

fn normalize_pairs(pairs: &[Correspondence]) -> KeyMatchResult<Normalized> {
    let t_src = normalize_points(pairs.iter().map(|p| p.0))?;
    let t_dst = normalize_points(pairs.iter().map(|p| p.1))?;
    let t_dst_inv = t_dst.try_inverse().ok_or(KeyMatchError::DegenerateFit {
        reason: "singular normalization",
    })?;
    Ok(Normalized {
        src: pairs.iter().map(|p| apply(&t_src, p.0)).collect(),
        dst: pairs.iter().map(|p| apply(&t_dst, p.1)).collect(),
        t_src,
        t_dst_inv,
    })
}

/// Projective transform from at least four correspondences.
///
/// Solves `A h = 0` for the stacked DLT constraints by taking the singular
/// vector of `AᵀA` with the smallest singular value. The result is scaled to
/// `h[2][2] = 1`.
pub fn fit_homography(pairs: &[Correspondence]) -> KeyMatchResult<Transform2d> {
    if pairs.len() < 4 {
        return Err(KeyMatchError::NotEnoughCorrespondences {
            needed: 4,
            got: pairs.len(),
        });
    }
    let norm = normalize_pairs(pairs)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (&[x, y], &[u, v]) in norm.src.iter().zip(norm.dst.iter()) {
        let rx = Row9::from_column_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        let ry = Row9::from_column_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        ata += rx * rx.transpose() + ry * ry.transpose();
    }

    let svd = ata.svd(true, true);
    let v_t = svd.v_t.ok_or(KeyMatchError::DegenerateFit {
        reason: "SVD V^T missing",
    })?;
    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));
    let largest = svd.singular_values[order[8]];
    if !(svd.singular_values[order[1]] > RANK_EPS * largest) {
        return Err(KeyMatchError::DegenerateFit {
            reason: "rank-deficient homography constraints",
        });
    }

    let h = v_t.row(order[0]);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let full = norm.t_dst_inv * hn * norm.t_src;
    Transform2d::from_matrix(&full).ok_or(KeyMatchError::DegenerateFit {
        reason: "homography maps the origin to infinity",
    })
}

/// Affine transform from at least three correspondences.
///
/// Least-squares solution of the 2n×6 system through a QR decomposition.
pub fn fit_affine(pairs: &[Correspondence]) -> KeyMatchResult<Transform2d> {
    if pairs.len() < 3 {
        return Err(KeyMatchError::NotEnoughCorrespondences {
            needed: 3,
            got: pairs.len(),
        });
    }
    let norm = normalize_pairs(pairs)?;
    let n = pairs.len();

    let mut a = DMatrix::<f64>::zeros(2 * n, 6);
    let mut b = DVector::<f64>::zeros(2 * n);
    for (i, (&[x, y], &[u, v])) in norm.src.iter().zip(norm.dst.iter()).enumerate() {
        a[(2 * i, 0)] = x;
        a[(2 * i, 1)] = y;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i + 1, 3)] = x;
        a[(2 * i + 1, 4)] = y;
        a[(2 * i + 1, 5)] = 1.0;
        b[2 * i] = u;
        b[2 * i + 1] = v;
    }

    let qr = a.qr();
    let r = qr.r();
    let diag_max = r.diagonal().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if r.diagonal().iter().any(|v| !(v.abs() > RANK_EPS.sqrt() * diag_max)) {
        return Err(KeyMatchError::DegenerateFit {
            reason: "collinear affine correspondences",
        });
    }
    let rhs = qr.q().transpose() * b;
    let p = r.solve_upper_triangular(&rhs).ok_or(KeyMatchError::DegenerateFit {
        reason: "singular affine system",
    })?;

    let an = Matrix3::new(p[0], p[1], p[2], p[3], p[4], p[5], 0.0, 0.0, 1.0);
    let full = norm.t_dst_inv * an * norm.t_src;
    let mut t = Transform2d::from_matrix(&full).ok_or(KeyMatchError::DegenerateFit {
        reason: "non-finite affine transform",
    })?;
    t.m[2] = [0.0, 0.0, 1.0];
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::{fit_affine, fit_homography};
    use crate::geometry::{Correspondence, Transform2d};
    use crate::util::KeyMatchError;

    fn project(t: &Transform2d, pts: &[[f64; 2]]) -> Vec<Correspondence> {
        pts.iter()
            .map(|&[x, y]| {
                let (u, v) = t.apply(x, y).unwrap();
                ([x, y], [u, v])
            })
            .collect()
    }

    fn assert_close(a: &Transform2d, b: &Transform2d, tol: f64) {
        for r in 0..3 {
            for c in 0..3 {
                assert!((a.m[r][c] - b.m[r][c]).abs() < tol, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn recovers_exact_homography_from_four_points() {
        let truth = Transform2d::new([[1.2, 0.1, 5.0], [-0.2, 0.9, 3.0], [1e-3, -2e-3, 1.0]]);
        let pairs = project(&truth, &[[0.0, 0.0], [100.0, 0.0], [100.0, 80.0], [0.0, 80.0]]);
        let fit = fit_homography(&pairs).unwrap();
        assert_close(&fit, &truth, 1e-6);
    }

    #[test]
    fn overdetermined_homography_reprojects_exactly() {
        let truth = Transform2d::similarity(std::f64::consts::FRAC_PI_2, 2.0, 40.0, -3.0);
        let pts: Vec<[f64; 2]> = (0..12)
            .map(|i| [(i * 7 % 13) as f64 * 3.0, (i * 5 % 11) as f64 * 4.0])
            .collect();
        let pairs = project(&truth, &pts);
        let fit = fit_homography(&pairs).unwrap();
        for pair in &pairs {
            assert!(fit.reprojection_error(pair) < 1e-6);
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let truth = Transform2d::identity();
        let pairs = project(&truth, &[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        assert!(matches!(
            fit_homography(&pairs),
            Err(KeyMatchError::DegenerateFit { .. })
        ));
        assert!(matches!(
            fit_affine(&pairs),
            Err(KeyMatchError::DegenerateFit { .. })
        ));
    }

    #[test]
    fn too_few_points_are_rejected() {
        let pairs = project(&Transform2d::identity(), &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert!(matches!(
            fit_homography(&pairs),
            Err(KeyMatchError::NotEnoughCorrespondences { needed: 4, got: 3 })
        ));
        assert!(fit_affine(&pairs[..2]).is_err());
    }

    #[test]
    fn recovers_affine_transform() {
        let truth = Transform2d::new([[0.8, -0.3, 12.0], [0.4, 1.1, -7.0], [0.0, 0.0, 1.0]]);
        let pairs = project(&truth, &[[0.0, 0.0], [10.0, 2.0], [3.0, 9.0], [7.0, 7.0], [1.0, 5.0]]);
        let fit = fit_affine(&pairs).unwrap();
        assert_close(&fit, &truth, 1e-9);
        assert!(fit.is_affine());
    }
}
