/// Parsers for resolved CSS values (`transform`, `transform-origin`,
/// `perspective`, `perspective-origin`)
///
/// Inputs are expected to be computed styles, so lengths are already in
/// pixels and transforms are already reduced to `matrix()` / `matrix3d()`.
/// Anything else degrades to a neutral value rather than an error.
use nalgebra::{Matrix4, Vector3};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Parse a numeric CSS value, ignoring any unit suffix (`100.55px` -> `100.55`).
///
/// Empty or non-numeric input yields `0.0`.
pub fn parse_unit_value(raw: &str) -> f32 {
    match number(raw.trim_start()) {
        Ok((_, parsed)) => parsed,
        Err(_) => 0.0,
    }
}

/// Parse a CSS origin string (`transform-origin`, `perspective-origin`) into
/// its X, Y and Z components. Missing components are zero.
pub fn parse_origin_value(raw: &str) -> Vector3<f32> {
    let mut components = raw.split_whitespace().map(parse_unit_value);
    Vector3::new(
        components.next().unwrap_or(0.0),
        components.next().unwrap_or(0.0),
        components.next().unwrap_or(0.0),
    )
}

/// Whether a computed value is the `none` keyword (or empty).
pub fn is_none(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw.eq_ignore_ascii_case("none")
}

/// Parse a CSS `matrix()` (3x2) or `matrix3d()` (4x4) string into an engine
/// matrix.
///
/// CSS is Y-down and the engine is Y-up, so the CSS matrix is conjugated by
/// `diag(1, -1, 1, 1)`: every term with exactly one Y index changes sign.
/// `none` and malformed values give the identity.
///
/// (https://keithclark.co.uk/articles/calculating-element-vertex-data-from-css-transforms/)
pub fn parse_transform_value(raw: &str) -> Matrix4<f32> {
    let Ok((_, (function, c))) = transform_function(raw.trim()) else {
        return Matrix4::identity();
    };

    match (function, c.len()) {
        (TransformFunction::Matrix, 6) => Matrix4::new(
            c[0], -c[2], 0.0, c[4],
            -c[1], c[3], 0.0, -c[5],
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ),
        // matrix3d() lists columns first.
        (TransformFunction::Matrix3d, 16) => Matrix4::new(
            c[0], -c[4], c[8], c[12],
            -c[1], c[5], -c[9], -c[13],
            c[2], -c[6], c[10], c[14],
            c[3], -c[7], c[11], c[15],
        ),
        _ => Matrix4::identity(),
    }
}

/// Format a matrix in CSS space as a `matrix3d()` value, the inverse of
/// [`parse_transform_value`] for CSS-space input. Near-zero terms are
/// written as `0`.
pub fn format_matrix3d(matrix: &Matrix4<f32>) -> String {
    let terms: Vec<String> = matrix
        .iter()
        .map(|&v| if v.abs() < f32::EPSILON { 0.0 } else { v })
        .map(|v| v.to_string())
        .collect();
    format!("matrix3d({})", terms.join(","))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransformFunction {
    Matrix,
    Matrix3d,
}

fn transform_function(input: &str) -> IResult<&str, (TransformFunction, Vec<f32>)> {
    all_consuming(pair(
        alt((
            // `matrix3d` must be tried first, `matrix` is its prefix.
            value(TransformFunction::Matrix3d, tag("matrix3d")),
            value(TransformFunction::Matrix, tag("matrix")),
        )),
        delimited(
            preceded(multispace0, char('(')),
            separated_list1(char(','), delimited(multispace0, number, multispace0)),
            char(')'),
        ),
    ))(input)
}

/// A CSS `<number>`. The exponent is optional and only consumed when it is
/// complete, so `10em` reads as `10` with an `em` unit.
fn number(input: &str) -> IResult<&str, f32> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| text.parse::<f32>(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, UnitQuaternion, Vector4};

    const EPS: f32 = 1e-5;

    #[test]
    fn test_format_matrix3d() {
        let css = Matrix4::new_translation(&Vector3::new(10.0, 20.0, 30.0));
        let text = format_matrix3d(&css);
        assert_eq!(text, "matrix3d(1,0,0,0,0,1,0,0,0,0,1,0,10,20,30,1)");
        let engine = parse_transform_value(&text);
        assert_eq!(engine.transform_point(&Point3::origin()), Point3::new(10.0, -20.0, 30.0));
    }

    #[test]
    fn test_unit_values() {
        assert_eq!(parse_unit_value("100.55px"), 100.55);
        assert_eq!(parse_unit_value("-20px"), -20.0);
        assert_eq!(parse_unit_value("10em"), 10.0);
        assert_eq!(parse_unit_value("1e3px"), 1000.0);
        assert_eq!(parse_unit_value(".5"), 0.5);
        assert_eq!(parse_unit_value(""), 0.0);
        assert_eq!(parse_unit_value("none"), 0.0);
    }

    #[test]
    fn test_origin_values() {
        assert_eq!(parse_origin_value("10px 20px"), Vector3::new(10.0, 20.0, 0.0));
        assert_eq!(
            parse_origin_value("125px 40.5px -8px"),
            Vector3::new(125.0, 40.5, -8.0)
        );
        assert_eq!(parse_origin_value(""), Vector3::zeros());
    }

    #[test]
    fn test_matrix_translation_flips_y() {
        let m = parse_transform_value("matrix(1, 0, 0, 1, 10, 20)");
        let translation = m.fixed_view::<3, 1>(0, 3).into_owned();
        assert_eq!(translation, Vector3::new(10.0, -20.0, 0.0));
        assert_eq!(m.fixed_view::<3, 3>(0, 0).into_owned(), nalgebra::Matrix3::identity());
    }

    #[test]
    fn test_rotate_90_is_negative_z_rotation() {
        // rotate(90deg) as reported by getComputedStyle
        let m = parse_transform_value("matrix(0, 1, -1, 0, 0, 0)");
        let rotation = UnitQuaternion::from_matrix(&m.fixed_view::<3, 3>(0, 0).into_owned());
        let (axis, angle) = rotation.axis_angle().expect("non-zero rotation");
        // CSS rotates clockwise on a Y-down screen; in Y-up that is -90deg about Z.
        let signed = angle * axis.z.signum();
        assert!((signed + std::f32::consts::FRAC_PI_2).abs() < EPS);

        // The CSS +X axis ends up pointing down the screen, i.e. engine -Y.
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(0.0, -1.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn test_none_and_garbage_are_identity() {
        assert_eq!(parse_transform_value("none"), Matrix4::identity());
        assert_eq!(parse_transform_value("garbage"), Matrix4::identity());
        assert_eq!(parse_transform_value(""), Matrix4::identity());
        assert_eq!(parse_transform_value("matrix(1, 2, 3)"), Matrix4::identity());
        assert_eq!(parse_transform_value("rotate(45deg)"), Matrix4::identity());
        assert_eq!(parse_transform_value("matrix(1, 0, 0, 1, 0, 0"), Matrix4::identity());
    }

    #[test]
    fn test_matrix3d_agrees_with_matrix() {
        let m2 = parse_transform_value("matrix(0.8, 0.6, -0.6, 0.8, 15, -7)");
        let m3 = parse_transform_value(
            "matrix3d(0.8, 0.6, 0, 0, -0.6, 0.8, 0, 0, 0, 0, 1, 0, 15, -7, 0, 1)",
        );
        assert!((m2 - m3).norm() < EPS);
    }

    #[test]
    fn test_matrix3d_rotate_x_flips_y_terms() {
        // rotateX(90deg): CSS y -> z, z -> -y
        let m = parse_transform_value(
            "matrix3d(1, 0, 0, 0, 0, 6.12323e-17, 1, 0, 0, -1, 6.12323e-17, 0, 0, 0, 0, 1)",
        );
        // The CSS +Y axis (engine -Y) maps to CSS +Z, which is engine +Z.
        let p = m.transform_point(&Point3::new(0.0, -1.0, 0.0));
        assert!((p - Point3::new(0.0, 0.0, 1.0)).norm() < EPS);
    }

    #[test]
    fn test_matrix3d_perspective_row() {
        // perspective(100px) puts -1/100 at column 2, row 3
        let m = parse_transform_value(
            "matrix3d(1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, -0.01, 0, 0, 0, 1)",
        );
        assert!((m[(3, 2)] + 0.01).abs() < EPS);
        assert_eq!(m[(3, 1)], 0.0);
    }

    #[test]
    fn test_matrix3d_y_perspective_term_is_negated() {
        let m = parse_transform_value(
            "matrix3d(1, 0, 0, 0, 0, 1, 0, 0.002, 0, 0, 1, 0, 0, 0, 0, 1)",
        );
        assert!((m[(3, 1)] + 0.002).abs() < EPS);

        // w of a mirrored point matches w of the CSS point: 1 + 0.002 * 100
        let css_w = 1.0 + 0.002 * 100.0;
        let engine = m * Vector4::new(30.0, -100.0, 0.0, 1.0);
        assert!((engine.w - css_w).abs() < EPS);
        assert!((engine.y + 100.0).abs() < EPS);
    }

    #[test]
    fn test_is_none() {
        assert!(is_none("none"));
        assert!(is_none("  "));
        assert!(!is_none("800px"));
    }
}
