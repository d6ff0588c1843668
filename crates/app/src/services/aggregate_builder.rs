//! Turns a [`Resolution`] into the set of aggregate
//! switches to publish and the previously published ones to retract.

use std::collections::HashSet;

use areamedia_domain::aggregate::AggregateSwitch;
use areamedia_domain::exclusion::ExclusionSet;
use areamedia_domain::id::AggregateId;
use areamedia_domain::resolver::Resolution;

/// Outcome of one build.
#[derive(Debug, Default)]
pub struct BuildPlan {
    /// Fresh switches, area switches first (in resolution order), global last.
    pub to_create: Vec<AggregateSwitch>,
    /// Previously published ids that have no counterpart in `to_create`.
    pub to_retire: Vec<AggregateId>,
}

/// Stateless builder for aggregate switches.
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateBuilder;

impl AggregateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build one switch per area with included members plus one global
    /// switch over their union.
    ///
    /// `published` holds the ids currently visible on the host; any of them
    /// not rebuilt here ends up in [`BuildPlan::to_retire`].
    #[must_use]
    pub fn build(
        &self,
        resolution: &Resolution,
        exclusions: &ExclusionSet,
        published: &HashSet<AggregateId>,
    ) -> BuildPlan {
        let mut plan = BuildPlan::default();
        let mut created: HashSet<AggregateId> = HashSet::new();

        for resolved in &resolution.areas {
            let built = AggregateSwitch::builder()
                .area(resolved.area.id.clone(), resolved.area.display_label())
                .members(resolved.included_ids().cloned())
                .excluded(resolved.excluded_ids().cloned())
                .build();
            let switch = match built {
                Ok(switch) => switch,
                Err(err) => {
                    tracing::warn!(%err, area = %resolved.area.name, "skipping area aggregate");
                    continue;
                }
            };
            if !created.insert(switch.id().clone()) {
                tracing::warn!(
                    unique_id = %switch.id(),
                    area = %resolved.area.name,
                    "another area already uses this label, skipping"
                );
                continue;
            }
            plan.to_create.push(switch);
        }

        let global = AggregateSwitch::builder()
            .global()
            .members(resolution.all_included().cloned())
            .excluded(exclusions.iter().cloned())
            .build();
        match global {
            Ok(switch) => {
                if !created.insert(switch.id().clone()) {
                    tracing::warn!(unique_id = %switch.id(), "an area label collides with the global switch, dropping the area switch");
                    plan.to_create.retain(|other| other.id() != switch.id());
                }
                plan.to_create.push(switch);
            }
            Err(err) => tracing::debug!(%err, "no global aggregate for this build"),
        }

        let mut to_retire: Vec<AggregateId> = published
            .iter()
            .filter(|id| !created.contains(*id))
            .cloned()
            .collect();
        to_retire.sort();
        plan.to_retire = to_retire;

        tracing::debug!(
            create = plan.to_create.len(),
            retire = plan.to_retire.len(),
            "aggregate build planned"
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areamedia_domain::aggregate::Scope;
    use areamedia_domain::area::Area;
    use areamedia_domain::entity::MemberEntity;
    use areamedia_domain::id::{AreaId, EntityId};
    use areamedia_domain::resolver::resolve;
    use std::collections::HashMap;

    fn area(id: &str, name: &str) -> Area {
        Area::builder().id(id).name(name).build().unwrap()
    }

    fn in_area(id: &str, area_id: &str) -> MemberEntity {
        MemberEntity::builder()
            .entity_id(id)
            .name(id)
            .area_id(area_id)
            .build()
            .unwrap()
    }

    fn plan_for(
        areas: &[Area],
        entities: &[MemberEntity],
        exclusions: &ExclusionSet,
        published: &HashSet<AggregateId>,
    ) -> BuildPlan {
        let resolution = resolve(areas, entities, &HashMap::new(), exclusions);
        AggregateBuilder::new().build(&resolution, exclusions, published)
    }

    fn members(switch: &AggregateSwitch) -> Vec<&str> {
        switch.members().iter().map(EntityId::as_str).collect()
    }

    #[test]
    fn should_create_area_switches_and_global_union() {
        let areas = [area("a", "A"), area("b", "B")];
        let entities = [
            in_area("media_player.p1", "a"),
            in_area("media_player.p2", "a"),
            in_area("media_player.p3", "b"),
        ];

        let plan = plan_for(&areas, &entities, &ExclusionSet::new(), &HashSet::new());

        assert_eq!(plan.to_create.len(), 3);
        let global = plan.to_create.last().unwrap();
        assert_eq!(global.scope(), &Scope::Global);
        assert_eq!(
            members(global),
            vec!["media_player.p1", "media_player.p2", "media_player.p3"]
        );
    }

    #[test]
    fn should_keep_excluded_members_out_of_controllable_set() {
        let areas = [area("a", "A")];
        let entities = [in_area("media_player.p1", "a"), in_area("media_player.p2", "a")];
        let exclusions: ExclusionSet = ["media_player.p2"].into_iter().collect();

        let plan = plan_for(&areas, &entities, &exclusions, &HashSet::new());

        for switch in &plan.to_create {
            assert!(!switch.contains(&EntityId::new("media_player.p2")));
            assert!(switch.excluded().contains(&EntityId::new("media_player.p2")));
        }
    }

    #[test]
    fn should_give_global_switch_the_full_exclusion_list() {
        let areas = [area("a", "A")];
        let entities = [in_area("media_player.p1", "a")];
        let exclusions: ExclusionSet = ["media_player.elsewhere", "media_player.zz"]
            .into_iter()
            .collect();

        let plan = plan_for(&areas, &entities, &exclusions, &HashSet::new());

        let global = plan.to_create.last().unwrap();
        assert_eq!(global.excluded().len(), 2);
    }

    #[test]
    fn should_strip_area_prefix_from_label() {
        let areas = [area("s", "area_Study")];
        let entities = [in_area("media_player.desk", "s")];

        let plan = plan_for(&areas, &entities, &ExclusionSet::new(), &HashSet::new());

        assert_eq!(plan.to_create[0].label(), "Study");
        assert_eq!(plan.to_create[0].id().as_str(), "area_media_players_study");
    }

    #[test]
    fn should_keep_raw_name_for_area_named_only_the_prefix() {
        let areas = [area("x", "area_")];
        let entities = [in_area("media_player.lonely", "x")];

        let plan = plan_for(&areas, &entities, &ExclusionSet::new(), &HashSet::new());

        assert_eq!(plan.to_create.len(), 2);
        assert_eq!(plan.to_create[0].label(), "area_");
        assert_eq!(plan.to_create[0].id().as_str(), "area_media_players_area_");
        assert_eq!(members(&plan.to_create[0]), vec!["media_player.lonely"]);
    }

    #[test]
    fn should_retire_previously_published_area_that_became_empty() {
        let areas = [area("a", "A"), area("g", "Garage")];
        let entities = [in_area("media_player.p1", "a"), in_area("media_player.g", "g")];
        let exclusions: ExclusionSet = ["media_player.g"].into_iter().collect();
        let published: HashSet<AggregateId> = [
            AggregateId::new("area_media_players_a"),
            AggregateId::new("area_media_players_garage"),
            AggregateId::new("area_media_players_all"),
        ]
        .into_iter()
        .collect();

        let plan = plan_for(&areas, &entities, &exclusions, &published);

        assert_eq!(plan.to_retire, vec![AggregateId::new("area_media_players_garage")]);
        assert!(
            plan.to_create
                .iter()
                .all(|switch| switch.id().as_str() != "area_media_players_garage")
        );
    }

    #[test]
    fn should_omit_global_and_retire_everything_when_no_members_remain() {
        let areas = [area("a", "A")];
        let published: HashSet<AggregateId> = [
            AggregateId::new("area_media_players_a"),
            AggregateId::new("area_media_players_all"),
        ]
        .into_iter()
        .collect();

        let plan = plan_for(&areas, &[], &ExclusionSet::new(), &published);

        assert!(plan.to_create.is_empty());
        assert_eq!(plan.to_retire.len(), 2);
    }

    #[test]
    fn should_prefer_global_switch_over_area_labelled_all() {
        let areas = [area("x", "All"), area("k", "Kitchen")];
        let entities = [in_area("media_player.a", "x"), in_area("media_player.b", "k")];

        let plan = plan_for(&areas, &entities, &ExclusionSet::new(), &HashSet::new());

        let ids: Vec<&str> = plan.to_create.iter().map(|switch| switch.id().as_str()).collect();
        assert_eq!(ids, vec!["area_media_players_kitchen", "area_media_players_all"]);
        assert_eq!(plan.to_create.last().unwrap().scope(), &Scope::Global);
        assert_eq!(plan.to_create.last().unwrap().total_count(), 2);
    }

    #[test]
    fn should_skip_second_area_with_colliding_label() {
        let areas = [area("x", "Den"), area("y", "den")];
        let entities = [in_area("media_player.a", "x"), in_area("media_player.b", "y")];

        let plan = plan_for(&areas, &entities, &ExclusionSet::new(), &HashSet::new());

        let area_switches: Vec<_> = plan
            .to_create
            .iter()
            .filter(|switch| matches!(switch.scope(), Scope::Area { .. }))
            .collect();
        assert_eq!(area_switches.len(), 1);
        assert_eq!(area_switches[0].scope(), &Scope::Area { area_id: AreaId::new("x") });
        assert_eq!(plan.to_create.last().unwrap().total_count(), 2);
    }
}
