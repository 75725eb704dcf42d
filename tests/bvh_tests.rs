use skelkin::{parse_bvh, BvhExport, ChannelType, MotionBuilderMode, NameTable};

const ARM: &str = "HIERARCHY
ROOT Chest
{
  OFFSET 0 1.2 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Right Shoulder
  {
    OFFSET -0.2 0.3 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    JOINT RightElbow
    {
      OFFSET -0.3 0 0
      CHANNELS 3 Zrotation Xrotation Yrotation
      End Site
      {
        OFFSET -0.25 0 0
      }
    }
  }
}
MOTION
Frames: 4
Frame Time: 0.25
0 0 0 0 0 0 0 0 0 0 0 0
0.1 0.05 0 10 5 -3 20 0 45 0 30 0
0.2 0.1 0 20 10 -6 40 10 60 0 60 0
0.3 0.05 0.1 30 15 -9 60 20 90 0 75 10
";

fn channel_layout(chs: &skelkin::Channels) -> Vec<(String, ChannelType)> {
    chs.iter().map(|c| (c.name().as_str().to_string(), c.ctype())).collect()
}

/// Compares two posture buffers, treating quaternion pairs as equal up to
/// sign.
fn same_values(chs: &skelkin::Channels, a: &[f32], b: &[f32]) -> bool {
    let mut f = 0;
    for c in chs.iter() {
        let n = c.size();
        let (x, y) = (&a[f..f + n], &b[f..f + n]);
        let ok = if c.ctype() == ChannelType::Quat {
            let dot: f32 = x.iter().zip(y).map(|(p, q)| p * q).sum();
            dot.abs() > 1.0 - 1e-6
        } else {
            x.iter().zip(y).all(|(p, q)| (p - q).abs() < 1e-4)
        };
        if !ok {
            return false;
        }
        f += n;
    }
    true
}

#[test]
fn test_bvh_round_trip() {
    let mut first = parse_bvh(ARM, NameTable::new()).unwrap();
    assert_eq!(first.motion.len(), 4);
    assert_eq!(first.skeleton.len(), 4);

    let cfg = BvhExport::default().with_fps(4.0);
    let text = first.motion.save_bvh(&mut first.skeleton, &cfg).unwrap();
    let second = parse_bvh(&text, NameTable::new()).unwrap();

    let a = first.motion.channels().borrow();
    let b = second.motion.channels().borrow();
    assert_eq!(channel_layout(&a), channel_layout(&b));
    assert_eq!(second.motion.len(), first.motion.len());
    for f in 0..first.motion.len() {
        assert!((first.motion.keytime(f) - second.motion.keytime(f)).abs() < 1e-5);
        assert!(
            same_values(&a, first.motion.posture(f).values(), second.motion.posture(f).values()),
            "frame {f}"
        );
    }
}

#[test]
fn test_export_modes_round_trip_structure() {
    let mut bvh = parse_bvh(ARM, NameTable::new()).unwrap();
    for mode in [
        MotionBuilderMode::Standard,
        MotionBuilderMode::OmitLeafChannels,
        MotionBuilderMode::EndSiteLeaves,
    ] {
        let cfg = BvhExport::default().with_fps(4.0).with_mode(mode);
        let text = bvh.motion.save_bvh(&mut bvh.skeleton, &cfg).unwrap();
        let back = parse_bvh(&text, NameTable::new()).unwrap();
        assert_eq!(back.skeleton.len(), 4, "{mode:?}");
        assert!(back.skeleton.joint_id("Right_Shoulder").is_some());
        assert_eq!(back.motion.len(), 4);
    }
}

#[test]
fn test_bvh_global_positions() {
    let mut bvh = parse_bvh(ARM, NameTable::new()).unwrap();
    let sk = &mut bvh.skeleton;
    bvh.motion.apply_frame(0, skelkin::ChannelTarget::Skeleton(&mut *sk));
    sk.update_global_matrices();
    let elbow = sk.joint_id("RightElbow").unwrap();
    assert!(sk.joint(elbow).gcenter().abs_diff_eq(glam::Vec3::new(-0.5, 1.5, 0.0), 1e-6));
}

const SLIDER: &str = "HIERARCHY
ROOT Base
{
  OFFSET 0 0 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Slider
  {
    OFFSET 0 1 0
    CHANNELS 3 Xposition Yposition Zposition
    JOINT Tip
    {
      OFFSET 0 0.5 0
      CHANNELS 3 Zrotation Xrotation Yrotation
      End Site
      {
        OFFSET 0 0.2 0
      }
    }
  }
}
MOTION
Frames: 3
Frame Time: 0.5
0 0 0 0 0 0 0 0 0 0 0 0
0 0 0 10 0 0 0.25 0.5 -0.1 0 20 0
0 0 0 20 0 0 0.5 1 -0.2 0 40 10
";

#[test]
fn test_translation_only_joint_round_trip() {
    let mut first = parse_bvh(SLIDER, NameTable::new()).unwrap();
    let text = first
        .motion
        .save_bvh(&mut first.skeleton, &BvhExport::default().with_fps(2.0))
        .unwrap();
    assert!(text.contains("CHANNELS 3 Xposition Yposition Zposition"));
    let second = parse_bvh(&text, NameTable::new()).unwrap();

    let a = first.motion.channels().borrow();
    let b = second.motion.channels().borrow();
    let layout = channel_layout(&a);
    assert_eq!(layout, channel_layout(&b));
    assert!(layout.contains(&("Slider".to_string(), ChannelType::ZPos)));
    assert!(!layout.contains(&("Slider".to_string(), ChannelType::Quat)));
    assert_eq!(second.motion.len(), 3);
    for f in 0..3 {
        assert!(
            same_values(&a, first.motion.posture(f).values(), second.motion.posture(f).values()),
            "frame {f}"
        );
    }
}
