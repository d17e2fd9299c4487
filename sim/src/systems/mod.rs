//! ECS systems for the NPC simulation.
//!
//! Systems operate on the [`AgentStore`](crate::agents::AgentStore) and the
//! other world resources. They run in one chained schedule, in this order,
//! so each phase finishes for every agent before the next starts:
//!
//! 1. `clock_system` - tick counter and time of day
//! 2. `spatial_grid_update_system` - rebuild the neighbor grid
//! 3. `targeting_system` - nearest-enemy search (reads the grid)
//! 4. `decision_system` - behavior FSM, sets movement targets
//! 5. `attack_system` - fire projectiles
//! 6. `steering_system` - arrival + separation (compute backend)
//! 7. `movement_system` - integrate positions
//! 8. `projectile_system` - advance/collide projectiles (compute backend)
//! 9. `damage_system` - apply recorded hits
//! 10. `death_system` - retire dead agents
//! 11. `needs_system` - hunger, energy, healing, farming
//!
//! Targeting, steering and projectiles are data-parallel inside the system;
//! the ordering between systems is strict.

pub mod clock;
pub mod combat;
pub mod decision;
pub mod health;
pub mod movement;
pub mod needs;
pub mod projectile;

pub use clock::*;
pub use combat::*;
pub use decision::*;
pub use health::*;
pub use movement::*;
pub use needs::*;
pub use projectile::*;
