use spy_cats::breeds::BreedValidator;
use spy_cats::db::{Database, Page};
use spy_cats::error::{Entity, Error};
use spy_cats::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn breeds() -> BreedValidator {
    BreedValidator::fixed(["Siamese", "Persian", "Bengal", "Maine Coon"])
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

fn cat_input(name: &str, breed: &str) -> CreateCatInput {
    CreateCatInput {
        name: name.to_string(),
        years_of_experience: 5,
        breed: breed.to_string(),
        salary: 50000.0,
    }
}

fn register(db: &Database, name: &str) -> Cat {
    block_on(db.register_cat(&breeds(), cat_input(name, "Siamese")))
        .expect("Failed to register cat")
}

fn targets(count: usize) -> Vec<CreateTargetInput> {
    (0..count)
        .map(|i| CreateTargetInput {
            name: format!("Target {}", i),
            country: "Germany".to_string(),
            notes: "Initial notes".to_string(),
        })
        .collect()
}

fn create_mission(db: &Database, target_count: usize) -> Mission {
    db.create_mission(CreateMissionInput {
        name: "Operation Hairball".to_string(),
        description: "Recover the yarn".to_string(),
        targets: targets(target_count),
    })
    .expect("Failed to create mission")
}

fn target_ids(mission: &Mission) -> Vec<Uuid> {
    mission.targets.iter().map(|t| t.id).collect()
}

fn complete_all(db: &Database, mission: &Mission) -> Mission {
    let mut latest = mission.clone();
    for id in target_ids(mission) {
        latest = db
            .complete_target(mission.id, id)
            .expect("Failed to complete target");
    }
    latest
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "cats" {
        describe "register_cat" {
            it "registers a cat with a recognized breed" {
                let cat = block_on(db.register_cat(
                    &breeds(),
                    cat_input("Agent Whiskers", "Siamese"),
                )).expect("Failed to register");

                assert_eq!(cat.name, "Agent Whiskers");
                assert_eq!(cat.years_of_experience, 5);
                assert_eq!(cat.breed, "Siamese");
                assert_eq!(cat.salary, 50000.0);

                let found = db.get_cat(cat.id).expect("Query failed");
                assert_eq!(found.unwrap().name, "Agent Whiskers");
            }

            it "stores the catalog spelling of the breed" {
                let cat = block_on(db.register_cat(&breeds(), cat_input("Tom", "maine coon")))
                    .expect("Failed to register");
                assert_eq!(cat.breed, "Maine Coon");
            }

            it "rejects an unknown breed" {
                let result = block_on(db.register_cat(&breeds(), cat_input("Sparkle", "Unicorn")));
                assert!(matches!(result, Err(Error::InvalidBreed(_))));
                assert!(db.get_all_cats(Page::default()).unwrap().is_empty());
            }

            it "rejects invalid numbers before asking the catalog" {
                let mut input = cat_input("Shadow", "Unicorn");
                input.salary = 0.0;

                let result = block_on(db.register_cat(&breeds(), input));
                assert!(matches!(result, Err(Error::InvalidField { field: "salary", .. })));
            }
        }

        describe "get_all_cats" {
            it "returns cats ordered by name with pagination" {
                register(&db, "Zorro");
                register(&db, "Alpha");
                register(&db, "Milo");

                let all = db.get_all_cats(Page::default()).unwrap();
                let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["Alpha", "Milo", "Zorro"]);

                let page = db.get_all_cats(Page { limit: Some(1), offset: 1 }).unwrap();
                assert_eq!(page.len(), 1);
                assert_eq!(page[0].name, "Milo");
            }
        }

        describe "update_cat" {
            it "applies only the supplied fields" {
                let cat = register(&db, "Shadow");

                let updated = db.update_cat(cat.id, UpdateCatInput {
                    salary: Some(60000.0),
                    ..Default::default()
                }).expect("Failed to update");

                assert_eq!(updated.salary, 60000.0);
                assert_eq!(updated.name, "Shadow");
                assert_eq!(db.get_cat(cat.id).unwrap().unwrap().salary, 60000.0);
            }

            it "does not re-check the breed" {
                let cat = register(&db, "Shadow");

                let updated = db.update_cat(cat.id, UpdateCatInput {
                    breed: Some("Unicorn".to_string()),
                    ..Default::default()
                }).expect("Failed to update");

                assert_eq!(updated.breed, "Unicorn");
            }

            it "rejects negative experience and leaves the cat unchanged" {
                let cat = register(&db, "Shadow");

                let result = db.update_cat(cat.id, UpdateCatInput {
                    years_of_experience: Some(-2),
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                });

                assert!(matches!(result, Err(Error::InvalidField { field: "years_of_experience", .. })));
                assert_eq!(db.get_cat(cat.id).unwrap().unwrap().name, "Shadow");
            }

            it "fails for an unknown cat" {
                let result = db.update_cat(Uuid::new_v4(), UpdateCatInput::default());
                assert!(matches!(result, Err(Error::NotFound(Entity::Cat))));
            }
        }

        describe "delete_cat" {
            it "deletes a free cat" {
                let cat = register(&db, "Shadow");
                db.delete_cat(cat.id).expect("Failed to delete");
                assert!(db.get_cat(cat.id).unwrap().is_none());
            }

            it "refuses to delete a cat on an incomplete mission" {
                let cat = register(&db, "Shadow");
                let mission = create_mission(&db, 1);
                db.assign_cat(mission.id, cat.id).unwrap();

                match db.delete_cat(cat.id) {
                    Err(Error::CatAssigned { mission_id }) => assert_eq!(mission_id, mission.id),
                    other => panic!("expected CatAssigned, got {:?}", other),
                }
                assert!(db.get_cat(cat.id).unwrap().is_some());
            }

            it "deletes a cat whose mission is complete and clears the reference" {
                let cat = register(&db, "Shadow");
                let mission = create_mission(&db, 1);
                db.assign_cat(mission.id, cat.id).unwrap();
                complete_all(&db, &mission);

                db.delete_cat(cat.id).expect("Failed to delete");

                let mission = db.get_mission(mission.id).unwrap().unwrap();
                assert!(mission.cat_id.is_none());
                assert!(mission.is_complete());
            }

            it "fails for an unknown cat" {
                assert!(matches!(db.delete_cat(Uuid::new_v4()), Err(Error::NotFound(Entity::Cat))));
            }
        }

        describe "is_cat_free" {
            it "tracks engagement through the mission lifecycle" {
                let cat = register(&db, "Shadow");
                let mission = create_mission(&db, 1);
                assert!(db.is_cat_free(cat.id).unwrap());

                db.assign_cat(mission.id, cat.id).unwrap();
                assert!(!db.is_cat_free(cat.id).unwrap());
                assert_eq!(db.cat_availability(cat.id).unwrap().mission_id, Some(mission.id));

                complete_all(&db, &mission);
                assert!(db.is_cat_free(cat.id).unwrap());
            }

            it "fails for an unknown cat" {
                assert!(matches!(db.is_cat_free(Uuid::new_v4()), Err(Error::NotFound(Entity::Cat))));
            }
        }
    }

    describe "missions" {
        describe "create_mission" {
            it "accepts one to three targets" {
                for count in [1, 2, 3] {
                    let mission = create_mission(&db, count);
                    assert_eq!(mission.targets.len(), count);
                    assert!(!mission.is_complete());
                    assert!(mission.cat_id.is_none());
                }
            }

            it "rejects zero or four targets" {
                for count in [0, 4] {
                    let result = db.create_mission(CreateMissionInput {
                        name: "Bad".to_string(),
                        description: String::new(),
                        targets: targets(count),
                    });
                    assert!(matches!(result, Err(Error::InvalidTargetCount(n)) if n == count));
                }
                assert!(db.get_all_missions(&MissionFilter::default(), Page::default()).unwrap().is_empty());
            }

            it "keeps target order" {
                let mission = create_mission(&db, 3);
                let stored = db.get_mission(mission.id).unwrap().unwrap();
                let names: Vec<_> = stored.targets.iter().map(|t| t.name.clone()).collect();
                assert_eq!(names, vec!["Target 0", "Target 1", "Target 2"]);
            }
        }

        describe "get_mission" {
            it "returns None for a non-existent mission" {
                assert!(db.get_mission(Uuid::new_v4()).unwrap().is_none());
            }
        }

        describe "get_all_missions" {
            it "filters by completion and cat" {
                let cat = register(&db, "Shadow");
                let done = create_mission(&db, 1);
                let open = create_mission(&db, 1);
                complete_all(&db, &done);
                db.assign_cat(open.id, cat.id).unwrap();

                let complete = db.get_all_missions(&MissionFilter { complete: Some(true), cat_id: None }, Page::default()).unwrap();
                assert_eq!(complete.len(), 1);
                assert_eq!(complete[0].id, done.id);

                let active = db.get_all_missions(&MissionFilter { complete: Some(false), cat_id: None }, Page::default()).unwrap();
                assert_eq!(active.len(), 1);
                assert_eq!(active[0].id, open.id);
                assert_eq!(active[0].targets.len(), 1);

                let by_cat = db.get_all_missions(&MissionFilter { complete: None, cat_id: Some(cat.id) }, Page::default()).unwrap();
                assert_eq!(by_cat.len(), 1);
                assert_eq!(by_cat[0].id, open.id);
            }
        }

        describe "update_mission" {
            it "updates name and description" {
                let mission = create_mission(&db, 1);
                let updated = db.update_mission(mission.id, UpdateMissionInput {
                    name: Some("Operation Catnip".to_string()),
                    description: None,
                }).unwrap();

                assert_eq!(updated.name, "Operation Catnip");
                assert_eq!(updated.description, "Recover the yarn");
            }

            it "is locked once the mission is complete" {
                let mission = create_mission(&db, 1);
                complete_all(&db, &mission);

                let result = db.update_mission(mission.id, UpdateMissionInput {
                    name: Some("Too late".to_string()),
                    description: None,
                });
                assert!(matches!(result, Err(Error::MissionLocked)));
            }

            it "fails for an unknown mission" {
                let result = db.update_mission(Uuid::new_v4(), UpdateMissionInput::default());
                assert!(matches!(result, Err(Error::NotFound(Entity::Mission))));
            }
        }

        describe "delete_mission" {
            it "refuses an assigned mission until it is unassigned" {
                let cat = register(&db, "Shadow");
                let mission = create_mission(&db, 2);
                db.assign_cat(mission.id, cat.id).unwrap();

                assert!(matches!(db.delete_mission(mission.id), Err(Error::MissionAssigned)));

                db.unassign_cat(mission.id).unwrap();
                db.delete_mission(mission.id).expect("Failed to delete");
                assert!(db.get_mission(mission.id).unwrap().is_none());
                assert!(db.is_cat_free(cat.id).unwrap());
            }

            it "fails for an unknown mission" {
                assert!(matches!(db.delete_mission(Uuid::new_v4()), Err(Error::NotFound(Entity::Mission))));
            }
        }

        describe "complete_mission" {
            it "requires every target to be complete" {
                let mission = create_mission(&db, 2);
                let ids = target_ids(&mission);
                db.complete_target(mission.id, ids[0]).unwrap();

                assert!(matches!(
                    db.complete_mission(mission.id),
                    Err(Error::IncompleteTargets { remaining: 1 })
                ));
                assert!(!db.get_mission(mission.id).unwrap().unwrap().is_complete());
            }

            it "fails for an unknown mission" {
                let result = db.complete_mission(Uuid::new_v4());
                assert!(matches!(result, Err(Error::NotFound(Entity::Mission))));
            }

            it "is idempotent once complete" {
                let mission = create_mission(&db, 1);
                complete_all(&db, &mission);

                let first = db.complete_mission(mission.id).unwrap();
                let second = db.complete_mission(mission.id).unwrap();
                assert!(first.is_complete());
                assert!(second.is_complete());
            }
        }
    }

    describe "assignment" {
        it "assigns a free cat" {
            let cat = register(&db, "Agent A");
            let mission = create_mission(&db, 2);

            let assigned = db.assign_cat(mission.id, cat.id).unwrap();
            assert_eq!(assigned.cat_id, Some(cat.id));
            assert_eq!(db.get_mission(mission.id).unwrap().unwrap().cat_id, Some(cat.id));
        }

        it "rejects a cat that is busy elsewhere" {
            let cat = register(&db, "Agent A");
            let first = create_mission(&db, 2);
            let second = create_mission(&db, 1);
            db.assign_cat(first.id, cat.id).unwrap();

            match db.assign_cat(second.id, cat.id) {
                Err(Error::CatBusy { mission_id }) => assert_eq!(mission_id, first.id),
                other => panic!("expected CatBusy, got {:?}", other),
            }
            assert!(db.get_mission(second.id).unwrap().unwrap().cat_id.is_none());
        }

        it "treats re-assigning the same cat as a no-op" {
            let cat = register(&db, "Agent A");
            let mission = create_mission(&db, 1);
            db.assign_cat(mission.id, cat.id).unwrap();

            let again = db.assign_cat(mission.id, cat.id).unwrap();
            assert_eq!(again.cat_id, Some(cat.id));
        }

        it "rejects a second cat on an assigned mission" {
            let cat_a = register(&db, "Agent A");
            let cat_b = register(&db, "Agent B");
            let mission = create_mission(&db, 1);
            db.assign_cat(mission.id, cat_a.id).unwrap();

            match db.assign_cat(mission.id, cat_b.id) {
                Err(Error::AlreadyAssigned { cat_id }) => assert_eq!(cat_id, cat_a.id),
                other => panic!("expected AlreadyAssigned, got {:?}", other),
            }
            assert!(db.is_cat_free(cat_b.id).unwrap());
        }

        it "rejects assignment to a complete mission" {
            let cat = register(&db, "Agent A");
            let mission = create_mission(&db, 1);
            complete_all(&db, &mission);

            assert!(matches!(db.assign_cat(mission.id, cat.id), Err(Error::MissionComplete)));
        }

        it "reports unknown missions and cats" {
            let cat = register(&db, "Agent A");
            let mission = create_mission(&db, 1);

            assert!(matches!(db.assign_cat(Uuid::new_v4(), cat.id), Err(Error::NotFound(Entity::Mission))));
            assert!(matches!(db.assign_cat(mission.id, Uuid::new_v4()), Err(Error::NotFound(Entity::Cat))));
        }

        it "frees the cat when its mission completes" {
            let cat = register(&db, "Agent A");
            let first = create_mission(&db, 1);
            let second = create_mission(&db, 1);
            db.assign_cat(first.id, cat.id).unwrap();
            complete_all(&db, &first);

            let reassigned = db.assign_cat(second.id, cat.id).unwrap();
            assert_eq!(reassigned.cat_id, Some(cat.id));
            // the completed mission keeps its historical reference
            assert_eq!(db.get_mission(first.id).unwrap().unwrap().cat_id, Some(cat.id));
        }

        it "reports an unknown mission on unassign" {
            let result = db.unassign_cat(Uuid::new_v4());
            assert!(matches!(result, Err(Error::NotFound(Entity::Mission))));
        }

        it "attaches the assigned cat's record" {
            let cat = register(&db, "Agent A");
            let assigned = create_mission(&db, 1);
            let open = create_mission(&db, 1);
            db.assign_cat(assigned.id, cat.id).unwrap();

            let missions = db
                .get_all_missions(&MissionFilter::default(), Page::default())
                .unwrap();
            let details = db.with_cat_details(missions).unwrap();

            assert_eq!(details.len(), 2);
            let with_cat = details.iter().find(|d| d.mission.id == assigned.id).unwrap();
            assert_eq!(with_cat.cat_details.as_ref().map(|c| c.name.as_str()), Some("Agent A"));
            let without_cat = details.iter().find(|d| d.mission.id == open.id).unwrap();
            assert!(without_cat.cat_details.is_none());
        }

        it "unassigns even after completion" {
            let cat = register(&db, "Agent A");
            let mission = create_mission(&db, 1);
            db.assign_cat(mission.id, cat.id).unwrap();
            complete_all(&db, &mission);

            let unassigned = db.unassign_cat(mission.id).unwrap();
            assert!(unassigned.cat_id.is_none());
            assert!(unassigned.is_complete());
        }

        it "lets exactly one of two concurrent assignments win" {
            let cat = register(&db, "Agent A");
            let first = create_mission(&db, 1);
            let second = create_mission(&db, 1);
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

            let handles: Vec<_> = [first.id, second.id]
                .into_iter()
                .map(|mission_id| {
                    let db = db.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        db.assign_cat(mission_id, cat.id)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let wins = results.iter().filter(|r| r.is_ok()).count();
            let busy = results
                .iter()
                .filter(|r| matches!(r, Err(Error::CatBusy { .. }) | Err(Error::AlreadyAssigned { .. })))
                .count();
            assert_eq!(wins, 1);
            assert_eq!(busy, 1);

            let holders = db
                .get_all_missions(&MissionFilter { complete: Some(false), cat_id: Some(cat.id) }, Page::default())
                .unwrap();
            assert_eq!(holders.len(), 1);
        }
    }

    describe "targets" {
        describe "update_target" {
            it "updates notes on an open target" {
                let mission = create_mission(&db, 1);
                let id = target_ids(&mission)[0];

                let updated = db.update_target(mission.id, id, UpdateTargetInput {
                    notes: Some("Spotted at the harbour".to_string()),
                    ..Default::default()
                }).unwrap();

                let target = updated.targets.get(id).unwrap();
                assert_eq!(target.notes, "Spotted at the harbour");
                assert!(!target.is_complete());
            }

            it "updates notes and completes in one step" {
                let mission = create_mission(&db, 1);
                let id = target_ids(&mission)[0];

                let updated = db.update_target(mission.id, id, UpdateTargetInput {
                    notes: Some("Updated notes".to_string()),
                    complete: Some(true),
                    ..Default::default()
                }).unwrap();

                assert!(updated.targets.get(id).unwrap().is_complete());
                assert!(updated.is_complete());
            }

            it "is locked for a completed target regardless of field" {
                let mission = create_mission(&db, 2);
                let id = target_ids(&mission)[0];
                db.complete_target(mission.id, id).unwrap();

                let edits = [
                    UpdateTargetInput { notes: Some("x".to_string()), ..Default::default() },
                    UpdateTargetInput { name: Some("x".to_string()), ..Default::default() },
                    UpdateTargetInput { country: Some("x".to_string()), ..Default::default() },
                    UpdateTargetInput::default(),
                ];
                for edit in edits {
                    assert!(matches!(db.update_target(mission.id, id, edit), Err(Error::TargetLocked)));
                }
                let stored = db.get_mission(mission.id).unwrap().unwrap();
                assert_eq!(stored.targets.get(id).unwrap().notes, "Initial notes");
            }

            it "does not find a target through another mission" {
                let mission = create_mission(&db, 1);
                let other = create_mission(&db, 1);
                let id = target_ids(&mission)[0];

                let result = db.update_target(other.id, id, UpdateTargetInput::default());
                assert!(matches!(result, Err(Error::NotFound(Entity::Target))));
            }
        }

        describe "complete_target" {
            it "completes the mission with its last target" {
                let mission = create_mission(&db, 2);
                let ids = target_ids(&mission);

                let after_first = db.complete_target(mission.id, ids[0]).unwrap();
                assert!(!after_first.is_complete());

                let after_second = db.complete_target(mission.id, ids[1]).unwrap();
                assert!(after_second.is_complete());
                assert!(db.get_mission(mission.id).unwrap().unwrap().is_complete());

                for id in ids {
                    let result = db.update_target(mission.id, id, UpdateTargetInput {
                        notes: Some("after the fact".to_string()),
                        ..Default::default()
                    });
                    assert!(matches!(result, Err(Error::TargetLocked)));
                }
            }

            it "is idempotent" {
                let mission = create_mission(&db, 2);
                let id = target_ids(&mission)[0];
                db.complete_target(mission.id, id).unwrap();
                let again = db.complete_target(mission.id, id).unwrap();
                assert!(again.targets.get(id).unwrap().is_complete());
            }

            it "fails for an unknown target" {
                let mission = create_mission(&db, 1);
                let result = db.complete_target(mission.id, Uuid::new_v4());
                assert!(matches!(result, Err(Error::NotFound(Entity::Target))));
            }
        }

        describe "add_target" {
            it "adds up to three targets" {
                let mission = create_mission(&db, 2);
                let extra = || CreateTargetInput {
                    name: "Extra".to_string(),
                    country: "Spain".to_string(),
                    notes: String::new(),
                };

                let updated = db.add_target(mission.id, extra()).unwrap();
                assert_eq!(updated.targets.len(), 3);
                assert!(matches!(db.add_target(mission.id, extra()), Err(Error::InvalidTargetCount(4))));
                assert_eq!(db.get_mission(mission.id).unwrap().unwrap().targets.len(), 3);
            }
        }

        describe "remove_target" {
            it "removes an open target but never the last one" {
                let mission = create_mission(&db, 2);
                let ids = target_ids(&mission);

                let updated = db.remove_target(mission.id, ids[0]).unwrap();
                assert_eq!(target_ids(&updated), vec![ids[1]]);
                assert!(matches!(db.remove_target(mission.id, ids[1]), Err(Error::InvalidTargetCount(0))));
            }

            it "refuses to remove a completed target" {
                let mission = create_mission(&db, 2);
                let ids = target_ids(&mission);
                db.complete_target(mission.id, ids[0]).unwrap();

                assert!(matches!(db.remove_target(mission.id, ids[0]), Err(Error::TargetLocked)));
                assert_eq!(db.get_mission(mission.id).unwrap().unwrap().targets.len(), 2);
            }

            it "refuses to remove targets from a complete mission" {
                let mission = create_mission(&db, 2);
                let completed = complete_all(&db, &mission);
                assert!(completed.is_complete());

                let id = target_ids(&mission)[0];
                assert!(matches!(db.remove_target(mission.id, id), Err(Error::MissionLocked)));
                assert_eq!(db.get_mission(mission.id).unwrap().unwrap().targets.len(), 2);
            }

            it "reports an unknown target" {
                let mission = create_mission(&db, 2);
                let result = db.remove_target(mission.id, Uuid::new_v4());
                assert!(matches!(result, Err(Error::NotFound(Entity::Target))));
            }
        }
    }

    describe "persistence" {
        it "cascades target deletion to the stored rows" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("agency.db");
            let file_db = Database::open(path.clone()).expect("Failed to open database");
            file_db.migrate().expect("Failed to migrate");

            let mission = create_mission(&file_db, 3);
            file_db.delete_mission(mission.id).expect("Failed to delete");

            let conn = rusqlite::Connection::open(&path).expect("Failed to open raw connection");
            let remaining: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM targets WHERE mission_id = ?",
                    [mission.id.to_string()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(remaining, 0);
        }

        it "survives reopening the database file" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("agency.db");

            let (cat_id, mission_id) = {
                let file_db = Database::open(path.clone()).unwrap();
                file_db.migrate().unwrap();
                let cat = register(&file_db, "Shadow");
                let mission = create_mission(&file_db, 2);
                file_db.assign_cat(mission.id, cat.id).unwrap();
                (cat.id, mission.id)
            };

            let reopened = Database::open(path).unwrap();
            reopened.migrate().unwrap();
            let mission = reopened.get_mission(mission_id).unwrap().unwrap();
            assert_eq!(mission.cat_id, Some(cat_id));
            assert_eq!(mission.targets.len(), 2);
            assert!(!reopened.is_cat_free(cat_id).unwrap());
        }
    }
}
