//! The fixed gameplay event catalogue.
//!
//! Each event is an optional plugin export named `modlink_ev_<event>` with a
//! frozen argument shape. The catalogue is declared once, through
//! [`for_each_event!`], so the handler typedefs here, the host-side handler
//! table, its symbol resolution, and the dispatch fan-out all stay in
//! lockstep. Adding an event means adding exactly one line to the list.

use crate::abi::{ObjectRef, StrRef};

/// Invoke `$callback!` with the full event catalogue.
///
/// The callback receives one brace group per event:
/// `{ name: <ident>, ty: <handler typedef ident>, args: (<arg>: <ty>, ...) }`.
/// Argument types are the bare ABI type names; bring them into scope
/// (`use modlink_plugin_sdk::abi::{ObjectRef, StrRef};`) before expanding.
#[macro_export]
macro_rules! for_each_event {
    ($callback:ident) => {
        $callback! {
            { name: anim_changed, ty: AnimChangedFn, args: (unit: ObjectRef, anim: StrRef) }
            { name: anim_done, ty: AnimDoneFn, args: (unit: ObjectRef, anim: StrRef) }
            { name: container_closed, ty: ContainerClosedFn, args: (container: ObjectRef, player: ObjectRef) }
            { name: engine, ty: EngineFn, args: (vehicle: ObjectRef, running: bool) }
            { name: explosion, ty: ExplosionFn, args: (vehicle: ObjectRef, damage: f32) }
            { name: fired, ty: FiredFn, args: (unit: ObjectRef, weapon: StrRef, muzzle: StrRef, ammo: StrRef, projectile: ObjectRef) }
            { name: fired_near, ty: FiredNearFn, args: (unit: ObjectRef, shooter: ObjectRef, distance: f32, weapon: StrRef, ammo: StrRef) }
            { name: fuel, ty: FuelFn, args: (vehicle: ObjectRef, has_fuel: bool) }
            { name: gear, ty: GearFn, args: (vehicle: ObjectRef, down: bool) }
            { name: get_in, ty: GetInFn, args: (vehicle: ObjectRef, seat: StrRef, unit: ObjectRef) }
            { name: get_out, ty: GetOutFn, args: (vehicle: ObjectRef, seat: StrRef, unit: ObjectRef) }
            { name: handle_damage, ty: HandleDamageFn, args: (unit: ObjectRef, part: StrRef, damage: f32, source: ObjectRef, hit_index: i32) }
            { name: handle_heal, ty: HandleHealFn, args: (unit: ObjectRef, healer: ObjectRef, can_heal: bool) }
            { name: handle_rating, ty: HandleRatingFn, args: (unit: ObjectRef, rating: f32) }
            { name: handle_score, ty: HandleScoreFn, args: (unit: ObjectRef, target: ObjectRef, score: f32) }
            { name: hit, ty: HitFn, args: (unit: ObjectRef, caused_by: ObjectRef, damage: f32) }
            { name: incoming_missile, ty: IncomingMissileFn, args: (target: ObjectRef, ammo: StrRef, shooter: ObjectRef) }
            { name: init, ty: InitFn, args: (unit: ObjectRef) }
            { name: inventory_closed, ty: InventoryClosedFn, args: (unit: ObjectRef, container: ObjectRef) }
            { name: inventory_opened, ty: InventoryOpenedFn, args: (unit: ObjectRef, container: ObjectRef) }
            { name: item_put, ty: ItemPutFn, args: (unit: ObjectRef, container: ObjectRef, item: StrRef) }
            { name: item_taken, ty: ItemTakenFn, args: (unit: ObjectRef, container: ObjectRef, item: StrRef) }
            { name: killed, ty: KilledFn, args: (unit: ObjectRef, killer: ObjectRef) }
            { name: local_changed, ty: LocalChangedFn, args: (object: ObjectRef, local: bool) }
            { name: respawned, ty: RespawnedFn, args: (unit: ObjectRef, corpse: ObjectRef) }
            { name: seat_switched, ty: SeatSwitchedFn, args: (vehicle: ObjectRef, first: ObjectRef, second: ObjectRef) }
            { name: sound_played, ty: SoundPlayedFn, args: (unit: ObjectRef, sound_code: i32) }
            { name: weapon_assembled, ty: WeaponAssembledFn, args: (unit: ObjectRef, weapon: ObjectRef) }
            { name: weapon_deployed, ty: WeaponDeployedFn, args: (unit: ObjectRef, deployed: bool) }
            { name: weapon_rested, ty: WeaponRestedFn, args: (unit: ObjectRef, rested: bool) }
        }
    };
}

macro_rules! declare_event_fns {
    ( $( { name: $name:ident, ty: $ty:ident, args: ( $( $arg:ident : $argty:ty ),* ) } )+ ) => {
        $(
            pub type $ty = unsafe extern "C" fn( $( $arg: $argty ),* );
        )+
    };
}

for_each_event!(declare_event_fns);
