//! Per-instance playback clock: state machine, wrap-around ticking,
//! seek, and animation selection (§4.7).

use crate::codec::Animation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// An instance's animation playback state, bound to a pool-allocated
/// bone palette slot.
#[derive(Debug, Clone)]
pub struct Animator {
    pub base_id: u16,
    pub current_animation_index: Option<u32>,
    pub time_in_ticks: f32,
    pub time_scale: f32,
    pub looping: bool,
    pub state: PlaybackState,
    /// The pool allocator index backing this instance's bone palette;
    /// also the value published to shaders.
    pub shader_data_index: u32,
}

impl Animator {
    pub fn new(base_id: u16, shader_data_index: u32) -> Self {
        Animator {
            base_id,
            current_animation_index: None,
            time_in_ticks: 0.0,
            time_scale: 1.0,
            looping: true,
            state: PlaybackState::Stopped,
            shader_data_index,
        }
    }

    /// `STOPPED`/`PAUSED` → `PLAYING`, iff an animation is selected.
    pub fn play(&mut self) {
        if self.current_animation_index.is_some() {
            self.state = PlaybackState::Playing;
        }
    }

    /// `STOPPED`/`PLAYING` → `PAUSED`, iff an animation is selected.
    pub fn pause(&mut self) {
        if self.current_animation_index.is_some() {
            self.state = PlaybackState::Paused;
        }
    }

    /// `PLAYING`/`PAUSED` → `STOPPED`, resetting time to zero.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.time_in_ticks = 0.0;
    }

    /// Advances `time_in_ticks` for a `PLAYING` animator by
    /// `Δt × global_time_scale × instance_time_scale × ticks_per_second`,
    /// wrapping at the current animation's duration. No-op otherwise.
    pub fn update(&mut self, dt_seconds: f32, global_time_scale: f32, animations: &[Animation]) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(animation) = self.current_animation(animations) else {
            return;
        };
        let delta_ticks = dt_seconds * global_time_scale * self.time_scale * animation.ticks_per_second;
        self.time_in_ticks = wrap(self.time_in_ticks + delta_ticks, animation.duration);
    }

    /// §4.7's literal formula is `time_in_ticks = ticks_per_second ×
    /// mod(time_seconds, duration)`, which mods a seconds value by a
    /// ticks-valued `duration` — unit-inconsistent as written (the
    /// original `kanimated_mesh_instance_seek` is a stub and settles
    /// nothing here). We convert to ticks first (`ticks_per_second ×
    /// time_seconds`) and wrap against `duration` only afterwards, so
    /// both operands of `wrap` are in ticks; this is the deliberate
    /// resolution, not an oversight.
    pub fn seek(&mut self, time_seconds: f32, animations: &[Animation]) {
        let Some(animation) = self.current_animation(animations) else {
            return;
        };
        self.time_in_ticks = wrap(animation.ticks_per_second * time_seconds, animation.duration);
    }

    pub fn seek_percent(&mut self, percent: f32, animations: &[Animation]) {
        let Some(animation) = self.current_animation(animations) else {
            return;
        };
        if animation.ticks_per_second <= 0.0 {
            return;
        }
        let duration_seconds = animation.duration / animation.ticks_per_second;
        let clamped = percent.clamp(0.0, 1.0);
        self.seek(duration_seconds * clamped, animations);
    }

    /// Linear scan by name. On success, selects it and resets time to
    /// zero. On a miss, falls back to index 0 if any animation exists,
    /// else leaves `current_animation_index` as `None`; both paths warn.
    pub fn set_animation(&mut self, name: &str, animations: &[Animation]) {
        match animations.iter().position(|a| a.name.as_deref() == Some(name)) {
            Some(index) => {
                self.current_animation_index = Some(index as u32);
            }
            None => {
                tracing::warn!(animation = name, "animation not found by name");
                self.current_animation_index = if animations.is_empty() { None } else { Some(0) };
            }
        }
        self.time_in_ticks = 0.0;
    }

    fn current_animation<'a>(&self, animations: &'a [Animation]) -> Option<&'a Animation> {
        self.current_animation_index.and_then(|i| animations.get(i as usize))
    }
}

/// Modulo on positive durations, rebased by `+modulus` when negative.
fn wrap(value: f32, modulus: f32) -> f32 {
    if modulus <= 0.0 {
        return 0.0;
    }
    let wrapped = value % modulus;
    if wrapped < 0.0 {
        wrapped + modulus
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Animation;

    fn idle_animation() -> Animation {
        Animation {
            name: Some("idle".to_string()),
            duration: 2.0 * 30.0,
            ticks_per_second: 30.0,
            channels: vec![],
        }
    }

    #[test]
    fn wraps_back_to_start_after_one_full_cycle() {
        let animations = vec![idle_animation()];
        let mut animator = Animator::new(0, 0);
        animator.set_animation("idle", &animations);
        animator.play();

        let dt = 1.0 / 60.0;
        for _ in 0..120 {
            animator.update(dt, 1.0, &animations);
        }
        assert!(animator.time_in_ticks.abs() < 1e-3 || (animator.time_in_ticks - 60.0).abs() < 1e-3);
    }

    #[test]
    fn stopped_animator_does_not_advance() {
        let animations = vec![idle_animation()];
        let mut animator = Animator::new(0, 0);
        animator.set_animation("idle", &animations);
        animator.update(1.0, 1.0, &animations);
        assert_eq!(animator.time_in_ticks, 0.0);
    }

    #[test]
    fn set_animation_falls_back_to_first_on_miss() {
        let animations = vec![idle_animation()];
        let mut animator = Animator::new(0, 0);
        animator.set_animation("missing", &animations);
        assert_eq!(animator.current_animation_index, Some(0));
    }

    #[test]
    fn play_is_a_no_op_without_a_selected_animation() {
        let mut animator = Animator::new(0, 0);
        animator.play();
        assert_eq!(animator.state, PlaybackState::Stopped);
    }
}
