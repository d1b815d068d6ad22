#[cfg(test)]
mod bounding_box_tests {
    use crate::spatial::math::vector::V3c;
    use crate::spatial::{BoundingBox, BoundingSphere};

    #[test]
    fn test_from_points_and_merge() {
        let points = [
            V3c::new(1., 2., 3.),
            V3c::new(-1., 5., 0.),
            V3c::new(4., -2., 2.),
        ];
        let bounds = BoundingBox::from_points(points.iter());
        assert_eq!(bounds.min_position, V3c::new(-1., -2., 0.));
        assert_eq!(bounds.max_position, V3c::new(4., 5., 3.));

        let mut merged = bounds;
        merged.merge_with(&BoundingBox::new(V3c::new(-5., 0., 0.), V3c::new(0., 9., 0.)));
        assert_eq!(merged.min_position, V3c::new(-5., -2., 0.));
        assert_eq!(merged.max_position, V3c::new(4., 9., 3.));
    }

    #[test]
    fn test_degenerate_sentinel() {
        assert!(BoundingBox::default().is_degenerate());
        assert!(BoundingBox::from_points([].iter()).is_degenerate());
        assert!(!BoundingBox::new(V3c::unit(0.), V3c::unit(1.)).is_degenerate());
    }

    #[test]
    fn test_containment() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(10.));
        assert!(bounds.contains_point(&V3c::new(5., 5., 5.)));
        assert!(bounds.contains_point(&V3c::new(0., 10., 0.))); // edges included
        assert!(!bounds.contains_point(&V3c::new(5., 11., 5.)));

        let inner = BoundingBox::new(V3c::unit(2.), V3c::unit(4.));
        let straddling = BoundingBox::new(V3c::unit(8.), V3c::unit(12.));
        assert!(bounds.contains_box(&inner));
        assert!(!bounds.contains_box(&straddling));
        assert!(bounds.intersects_box(&straddling));
        assert!(!bounds.intersects_box(&BoundingBox::new(V3c::unit(11.), V3c::unit(12.))));
    }

    #[test]
    fn test_child_bounds_cover_the_parent() {
        let bounds = BoundingBox::new(V3c::new(0., 0., 0.), V3c::new(8., 4., 2.));
        let mut merged = BoundingBox::default();
        for octant in 0..8u8 {
            let child = bounds.child_bounds_for(octant);
            assert_eq!(child.extents(), bounds.extents() * 0.5);
            assert!(bounds.contains_box(&child));
            if merged.is_degenerate() {
                merged = child;
            } else {
                merged.merge_with(&child);
            }
        }
        assert_eq!(merged, bounds);
    }

    #[test]
    fn test_octant_for_point_matches_child_bounds() {
        let bounds = BoundingBox::new(V3c::new(-4., -4., -4.), V3c::new(4., 4., 4.));
        for octant in 0..8u8 {
            let child = bounds.child_bounds_for(octant);
            assert_eq!(bounds.octant_for_point(&child.center()), octant);
        }
    }

    #[test]
    fn test_cubified() {
        let bounds = BoundingBox::new(V3c::new(0., 0., 0.), V3c::new(8., 2., 4.));
        let cube = bounds.cubified();
        assert_eq!(cube.extents(), V3c::unit(8.));
        assert!((cube.center() - bounds.center()).length() < 0.0001);
        assert!(cube.contains_box(&bounds));
    }

    #[test]
    fn test_sphere_intersection() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(2.));
        assert!(bounds.intersects_sphere(&BoundingSphere::new(V3c::unit(1.), 0.1)));
        assert!(bounds.intersects_sphere(&BoundingSphere::new(V3c::new(3., 1., 1.), 1.1)));
        assert!(!bounds.intersects_sphere(&BoundingSphere::new(V3c::new(3., 1., 1.), 0.9)));
    }

    #[test]
    fn test_transformed() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(1.));
        let transform = nalgebra::Matrix4::new_translation(&nalgebra::Vector3::new(5., 0., 0.))
            * nalgebra::Matrix4::new_scaling(2.);
        let transformed = bounds.transformed(&transform);
        assert!((transformed.min_position - V3c::new(5., 0., 0.)).length() < 0.0001);
        assert!((transformed.max_position - V3c::new(7., 2., 2.)).length() < 0.0001);
    }
}

#[cfg(test)]
mod raytracing_tests {
    use crate::spatial::math::vector::V3c;
    use crate::spatial::raytracing::Ray;
    use crate::spatial::BoundingBox;

    #[test]
    fn test_ray_box_hit_distance() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(2.));
        let ray = Ray::new(V3c::new(1., 1., 10.), V3c::new(0., 0., -1.));
        let hit = bounds.intersect_ray(&ray).unwrap();
        assert!((hit.impact_distance.unwrap() - 8.).abs() < 0.0001);
    }

    #[test]
    fn test_ray_box_miss() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(2.));
        let miss = Ray::new(V3c::new(5., 5., 10.), V3c::new(0., 0., -1.));
        assert!(bounds.intersect_ray(&miss).is_none());

        // box behind the ray origin is not an intersection
        let behind = Ray::new(V3c::new(1., 1., 10.), V3c::new(0., 0., 1.));
        assert!(bounds.intersect_ray(&behind).is_none());
    }

    #[test]
    fn test_ray_grazing_a_face_with_zero_direction_component() {
        // the ray descends exactly along the x = 5 face of the box; an origin
        // sitting on a slab boundary of an axis the ray does not move along
        // must still count as passing through the box
        let bounds = BoundingBox::new(V3c::new(2., 2., 0.), V3c::new(5., 5., 1.));
        let grazing = Ray::new(V3c::new(5., 3., 10.), V3c::new(0., 0., -1.));
        let hit = bounds.intersect_ray(&grazing).unwrap();
        assert!((hit.impact_distance.unwrap() - 9.).abs() < 0.0001);

        let outside = Ray::new(V3c::new(5.1, 3., 10.), V3c::new(0., 0., -1.));
        assert!(bounds.intersect_ray(&outside).is_none());
    }

    #[test]
    fn test_ray_box_origin_inside() {
        let bounds = BoundingBox::new(V3c::unit(0.), V3c::unit(2.));
        let ray = Ray::new(V3c::unit(1.), V3c::new(0., 0., -1.));
        let hit = bounds.intersect_ray(&ray).unwrap();
        assert!(hit.impact_distance.is_none());
    }

    #[test]
    fn test_ray_sphere() {
        use crate::spatial::BoundingSphere;
        let sphere = BoundingSphere::new(V3c::new(0., 0., -5.), 1.);
        assert!(sphere.intersects_ray(&Ray::new(V3c::unit(0.), V3c::new(0., 0., -1.))));
        assert!(!sphere.intersects_ray(&Ray::new(V3c::unit(0.), V3c::new(0., 0., 1.))));
        assert!(!sphere.intersects_ray(&Ray::new(V3c::new(0., 2., 0.), V3c::new(0., 0., -1.))));
    }

    #[test]
    fn test_transformed_ray() {
        let ray = Ray::new(V3c::new(1., 0., 0.), V3c::new(0., 0., -1.));
        let transform = nalgebra::Matrix4::new_translation(&nalgebra::Vector3::new(0., 2., 0.));
        let moved = ray.transformed(&transform);
        assert!((moved.origin - V3c::new(1., 2., 0.)).length() < 0.0001);
        assert!((moved.direction - ray.direction).length() < 0.0001);
    }
}
