//! The two-stage feedback simulation graph.
//!
//! Two variables, `velocity` and `position`, each own a pair of state
//! textures in an arena and an index saying which of the pair is current.
//! A step evaluates velocity first, flips its index, then evaluates position
//! against the fresh velocity and flips again:
//!
//! ```text
//! velocity[next] = f(position[cur], velocity[cur], target)   ; flip velocity
//! position[next] = g(position[cur], velocity[cur'])          ; flip position
//! ```
//!
//! Both stages are elementwise: texel `i` of the output depends only on
//! texel `i` of the inputs. The CPU executor here runs them with rayon; the
//! wgpu executor in `gpu::compute` dispatches the same programs on the GPU
//! using the same [`SimulationVariable`] bookkeeping.

use rand::Rng;
use rayon::prelude::*;

use crate::error::SeedError;
use crate::encoding::{StateTexture, TextureKind};
use crate::kernels::{position_step, velocity_step, ForceParams};
use crate::sampling::PointSet;
use crate::target::{Target, TargetSelector};
use crate::time::{StageClock, POSITION_PHASE, VELOCITY_PHASE};

/// Handle to a texture in an executor's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

impl TextureId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The two simulation variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Velocity,
    Position,
}

impl VariableKind {
    /// Evaluation order within one step.
    pub const ORDER: [VariableKind; 2] = [VariableKind::Velocity, VariableKind::Position];

    pub fn name(self) -> &'static str {
        match self {
            VariableKind::Velocity => "velocity",
            VariableKind::Position => "position",
        }
    }

    pub fn texture_kind(self) -> TextureKind {
        match self {
            VariableKind::Velocity => TextureKind::Velocity,
            VariableKind::Position => TextureKind::Position,
        }
    }

    /// Variables whose textures this stage reads. Fixed for both stages.
    pub fn dependencies(self) -> &'static [VariableKind] {
        &[VariableKind::Position, VariableKind::Velocity]
    }

    /// Starting phase of this stage's clock.
    pub fn phase(self) -> f32 {
        match self {
            VariableKind::Velocity => VELOCITY_PHASE,
            VariableKind::Position => POSITION_PHASE,
        }
    }
}

/// How the position variable is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialLayout {
    /// Random scatter on the `[-1, 1]²` plane; particles fly in to target A.
    /// Each particle keeps target A's brightness in its alpha channel.
    #[default]
    Scatter,
    /// Start exactly on target A.
    TargetA,
}

/// A compute stage: two ping-pong buffers, a current index and a clock.
#[derive(Debug, Clone)]
pub struct SimulationVariable {
    kind: VariableKind,
    buffers: [TextureId; 2],
    current: usize,
    clock: StageClock,
}

impl SimulationVariable {
    pub fn new(kind: VariableKind, buffers: [TextureId; 2]) -> Self {
        Self {
            kind,
            buffers,
            current: 0,
            clock: StageClock::new(kind.phase()),
        }
    }

    #[inline]
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[inline]
    pub fn dependencies(&self) -> &'static [VariableKind] {
        self.kind.dependencies()
    }

    /// Buffer holding the latest completed state.
    #[inline]
    pub fn current(&self) -> TextureId {
        self.buffers[self.current]
    }

    /// Buffer the next evaluation writes into.
    #[inline]
    pub fn next(&self) -> TextureId {
        self.buffers[1 - self.current]
    }

    /// Buffer `i` of the pair, regardless of which is current.
    #[inline]
    pub(crate) fn buffer(&self, i: usize) -> TextureId {
        self.buffers[i]
    }

    /// Which of the pair is current (0 or 1).
    #[inline]
    pub fn parity(&self) -> usize {
        self.current
    }

    /// Make the freshly written buffer current.
    #[inline]
    pub fn flip(&mut self) {
        self.current = 1 - self.current;
    }

    #[inline]
    pub fn clock(&self) -> &StageClock {
        &self.clock
    }

    /// Advance this stage's clock, returning the time for this evaluation.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        self.clock.advance()
    }
}

/// Initial contents of every texture the graph needs.
#[derive(Debug, Clone)]
pub struct GraphSeed {
    pub position: StateTexture,
    pub velocity: StateTexture,
    pub targets: [StateTexture; 2],
}

impl GraphSeed {
    /// Encode two point sets and randomize the rest.
    ///
    /// # Panics
    ///
    /// Panics if either point set does not hold exactly `size²` points.
    pub fn from_point_sets<R: Rng>(
        a: &PointSet,
        b: &PointSet,
        size: u32,
        layout: InitialLayout,
        rng: &mut R,
    ) -> Self {
        let target_a = StateTexture::from_points(a, size);
        let target_b = StateTexture::from_points(b, size);
        let position = match layout {
            InitialLayout::Scatter => {
                let mut scatter = StateTexture::random_positions(size, rng);
                for (texel, goal) in scatter.texels_mut().iter_mut().zip(target_a.texels()) {
                    texel.w = goal.w;
                }
                scatter
            }
            InitialLayout::TargetA => target_a.clone(),
        };
        let velocity = StateTexture::random_velocities(size, rng);
        Self {
            position,
            velocity,
            targets: [target_a, target_b],
        }
    }

    /// Texels per axis.
    pub fn size(&self) -> u32 {
        self.position.size()
    }

    /// Verify that every texture has the seed's size and the right kind.
    pub fn check(&self) -> Result<(), SeedError> {
        let size = self.position.size();
        let textures = [
            ("position", &self.position, TextureKind::Position),
            ("velocity", &self.velocity, TextureKind::Velocity),
            ("target A", &self.targets[0], TextureKind::Position),
            ("target B", &self.targets[1], TextureKind::Position),
        ];
        for (texture, state, expected) in textures {
            if state.kind() != expected {
                return Err(SeedError::Kind {
                    texture,
                    expected,
                    actual: state.kind(),
                });
            }
            if state.size() != size {
                return Err(SeedError::Size {
                    texture,
                    expected: size,
                    actual: state.size(),
                });
            }
        }
        Ok(())
    }
}

/// CPU executor for the feedback graph.
#[derive(Debug, Clone)]
pub struct FeedbackGraph {
    size: u32,
    arena: Vec<StateTexture>,
    targets: [TextureId; 2],
    velocity: SimulationVariable,
    position: SimulationVariable,
    selector: TargetSelector,
    /// The texture bound to the velocity stage's `u_target` uniform.
    bound_target: TextureId,
    params: ForceParams,
    frame: u64,
}

impl FeedbackGraph {
    /// Build the graph from its initial textures.
    ///
    /// # Panics
    ///
    /// Panics if texture sizes or kinds do not line up.
    pub fn new(seed: GraphSeed, params: ForceParams) -> Self {
        if let Err(err) = seed.check() {
            panic!("{err}");
        }
        let size = seed.size();
        let GraphSeed {
            position,
            velocity,
            targets: [target_a, target_b],
        } = seed;

        let arena = vec![
            target_a,
            target_b,
            position.clone(),
            position,
            velocity.clone(),
            velocity,
        ];
        let targets = [TextureId(0), TextureId(1)];

        Self {
            size,
            arena,
            targets,
            position: SimulationVariable::new(VariableKind::Position, [TextureId(2), TextureId(3)]),
            velocity: SimulationVariable::new(VariableKind::Velocity, [TextureId(4), TextureId(5)]),
            selector: TargetSelector::new(),
            bound_target: targets[Target::A.index()],
            params,
            frame: 0,
        }
    }

    /// Advance one frame: velocity stage, then position stage.
    pub fn step(&mut self) {
        let time = self.velocity.tick();
        let pos = self.position.current();
        let vel = self.velocity.current();
        let goal = self.bound_target;
        let params = self.params;
        self.evaluate(self.velocity.next(), |arena, i| {
            velocity_step(
                arena[pos.0].texel(i),
                arena[vel.0].texel(i),
                arena[goal.0].texel(i),
                i as u32,
                time,
                &params,
            )
        });
        self.velocity.flip();

        self.position.tick();
        let vel = self.velocity.current();
        self.evaluate(self.position.next(), |arena, i| {
            position_step(arena[pos.0].texel(i), arena[vel.0].texel(i))
        });
        self.position.flip();

        self.frame += 1;
    }

    /// Run `kernel` for every texel of `out`, reading from the rest of the arena.
    fn evaluate<F>(&mut self, out: TextureId, kernel: F)
    where
        F: Fn(&[StateTexture], usize) -> glam::Vec4 + Sync,
    {
        let kind = self.arena[out.0].kind();
        let mut target = std::mem::replace(&mut self.arena[out.0], StateTexture::new(kind, 0));
        let arena = &self.arena;
        target
            .texels_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, texel)| *texel = kernel(arena, i));
        self.arena[out.0] = target;
    }

    /// Flip the selected target and rebind the velocity stage's attractor.
    pub fn trigger(&mut self) -> Target {
        let selected = self.selector.trigger();
        self.bound_target = self.targets[selected.index()];
        selected
    }

    /// Texels per axis.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Particle count (`size²`).
    #[inline]
    pub fn particle_count(&self) -> usize {
        (self.size * self.size) as usize
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn selected(&self) -> Target {
        self.selector.current()
    }

    /// Texture currently bound as the velocity stage's target.
    #[inline]
    pub fn bound_target(&self) -> TextureId {
        self.bound_target
    }

    /// Arena handle of a target's encoded texture.
    #[inline]
    pub fn target_texture(&self, target: Target) -> TextureId {
        self.targets[target.index()]
    }

    #[inline]
    pub fn texture(&self, id: TextureId) -> &StateTexture {
        &self.arena[id.0]
    }

    pub fn variable(&self, kind: VariableKind) -> &SimulationVariable {
        match kind {
            VariableKind::Velocity => &self.velocity,
            VariableKind::Position => &self.position,
        }
    }

    /// The authoritative particle positions after the last step.
    ///
    /// The underlying buffer changes every step; do not hold on to it.
    pub fn current_positions(&self) -> &StateTexture {
        self.texture(self.position.current())
    }

    pub fn current_velocities(&self) -> &StateTexture {
        self.texture(self.velocity.current())
    }

    #[inline]
    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    /// Largest absolute coordinate of any particle on any axis.
    pub fn max_extent(&self) -> f32 {
        self.current_positions()
            .texels()
            .par_iter()
            .map(|t| t.x.abs().max(t.y.abs()).max(t.z.abs()))
            .reduce(|| 0.0, f32::max)
    }

    /// Mean distance between particles and their bound target texel.
    pub fn mean_target_error(&self) -> f32 {
        let positions = self.current_positions().texels();
        let goal = self.texture(self.bound_target).texels();
        let sum: f32 = positions
            .par_iter()
            .zip(goal.par_iter())
            .map(|(p, g)| p.truncate().distance(g.truncate()))
            .sum();
        sum / positions.len() as f32
    }

    /// Whether every position and velocity texel is finite.
    pub fn is_finite(&self) -> bool {
        self.current_positions().texels().iter().all(|t| t.is_finite())
            && self.current_velocities().texels().iter().all(|t| t.is_finite())
    }
}
