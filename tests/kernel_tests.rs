//! End-to-end tests of the respond pipeline: sentence handling, history,
//! rewrites, predicates, and session persistence.

mod common;

use aimlbot::{Kernel, GLOBAL_SESSION};
use common::{kernel_with, learn_str};

#[test]
fn greeting_category_answers() {
    let kernel = kernel_with(
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
    );
    assert_eq!(kernel.respond("Hello.", GLOBAL_SESSION), "Hi");
}

#[test]
fn star_capture_keeps_original_case() {
    let kernel = kernel_with(
        "<category><pattern>MY NAME IS *</pattern><template>Nice to meet you, <star/></template></category>",
    );
    assert_eq!(
        kernel.respond("My name is Alice", "s"),
        "Nice to meet you, Alice"
    );
}

#[test]
fn set_then_get_across_turns() {
    let kernel = kernel_with(concat!(
        r#"<category><pattern>I LIKE *</pattern><template><set name="fav"><star/></set></template></category>"#,
        r#"<category><pattern>WHAT DO I LIKE</pattern><template>You like <get name="fav"/></template></category>"#,
    ));
    assert_eq!(kernel.respond("I like cheese", "s"), "cheese");
    assert_eq!(kernel.respond("What do I like?", "s"), "You like cheese");
}

#[test]
fn srai_rewrites_recursively() {
    let kernel = kernel_with(concat!(
        "<category><pattern>HI</pattern><template>Hello.</template></category>",
        "<category><pattern>HELLO</pattern><template><srai>HI</srai></template></category>",
    ));
    assert_eq!(kernel.respond("hello", "s"), "Hello.");
}

#[test]
fn sr_is_srai_over_the_star() {
    let kernel = kernel_with(concat!(
        "<category><pattern>HI</pattern><template>Hello there</template></category>",
        "<category><pattern>SAY *</pattern><template><sr/></template></category>",
    ));
    assert_eq!(kernel.respond("say hi", "s"), "Hello there");
}

#[test]
fn condition_with_list_items_picks_first_match_or_default() {
    let kernel = kernel_with(concat!(
        r#"<category><pattern>TEST GENDER</pattern><template><condition name="g">"#,
        r#"<li value="m">Sir</li><li value="f">Madam</li><li>Friend</li>"#,
        "</condition></template></category>",
    ));
    kernel.set_predicate("g", "m", "s");
    assert_eq!(kernel.respond("test gender", "s"), "Sir");
    kernel.set_predicate("g", "f", "s");
    assert_eq!(kernel.respond("test gender", "s"), "Madam");
    kernel.set_predicate("g", "x", "s");
    assert_eq!(kernel.respond("test gender", "s"), "Friend");
}

#[test]
fn block_condition_checks_one_predicate() {
    let kernel = kernel_with(
        r#"<category><pattern>CHECK</pattern><template><condition name="g" value="m">handsome</condition></template></category>"#,
    );
    kernel.set_predicate("g", "m", "s");
    assert_eq!(kernel.respond("check", "s"), "handsome");
    kernel.set_predicate("g", "f", "s");
    assert_eq!(kernel.respond("check", "s"), "");
}

#[test]
fn multi_predicate_condition_names_each_item() {
    let kernel = kernel_with(concat!(
        "<category><pattern>WHO</pattern><template><condition>",
        r#"<li name="mood" value="up">Cheerful</li><li name="g" value="m">Sir</li><li>Someone</li>"#,
        "</condition></template></category>",
    ));
    kernel.set_predicate("g", "m", "s");
    assert_eq!(kernel.respond("who", "s"), "Sir");
    kernel.set_predicate("mood", "up", "s");
    assert_eq!(kernel.respond("who", "s"), "Cheerful");
    kernel.set_predicate("mood", "down", "s");
    kernel.set_predicate("g", "f", "s");
    assert_eq!(kernel.respond("who", "s"), "Someone");
}

#[test]
fn random_picks_one_of_the_items() {
    let kernel = kernel_with(concat!(
        "<category><pattern>SURPRISE ME</pattern><template><random>",
        "<li>one</li><li>two</li><li>three</li>",
        "</random></template></category>",
    ));
    let mut seen = std::collections::HashSet::new();
    for _ in 0..30 {
        let reply = kernel.respond("surprise me", "s");
        assert!(
            ["one", "two", "three"].contains(&reply.as_str()),
            "unexpected reply {:?}",
            reply
        );
        seen.insert(reply);
    }
    assert!(seen.len() >= 2, "thirty draws never varied");
}

#[test]
fn think_discards_output_but_keeps_side_effects() {
    let kernel = kernel_with(
        r#"<category><pattern>REMEMBER</pattern><template><think><set name="mood">happy</set></think></template></category>"#,
    );
    assert_eq!(kernel.respond("remember", "s"), "");
    assert_eq!(kernel.get_predicate("mood", "s"), "happy");
}

#[test]
fn that_element_replays_previous_response() {
    let kernel = kernel_with(concat!(
        "<category><pattern>SPEAK</pattern><template>The system works</template></category>",
        r#"<category><pattern>WHAT DID YOU SAY</pattern><template>I just said: <that index="1"/></template></category>"#,
    ));
    kernel.respond("speak", "s");
    assert_eq!(
        kernel.respond("what did you say", "s"),
        "I just said: The system works"
    );
}

#[test]
fn that_pattern_selects_on_previous_response() {
    let kernel = kernel_with(concat!(
        "<category><pattern>I SAY BEANS</pattern><template>Why beans?</template></category>",
        "<category><pattern>YES</pattern><that>WHY BEANS</that><template>beans confirmed</template></category>",
        "<category><pattern>YES</pattern><template>generic yes</template></category>",
    ));
    assert_eq!(kernel.respond("I say beans", "s"), "Why beans?");
    assert_eq!(kernel.respond("yes", "s"), "beans confirmed");
    assert_eq!(kernel.respond("yes", "s"), "generic yes");
}

#[test]
fn thatstar_captures_from_the_that_pattern() {
    let kernel = kernel_with(concat!(
        "<category><pattern>TEST THATSTAR</pattern><template>I say beans</template></category>",
        "<category><pattern>YES</pattern><that>I SAY *</that><template>I just said <thatstar/></template></category>",
    ));
    kernel.respond("test thatstar", "s");
    assert_eq!(kernel.respond("yes", "s"), "I just said beans");
}

#[test]
fn topic_categories_apply_while_topic_is_set() {
    let kernel = kernel_with(concat!(
        r#"<topic name="TALKING ABOUT *"><category><pattern>TELL ME</pattern><template><topicstar/> is the topic</template></category></topic>"#,
        "<category><pattern>TELL ME</pattern><template>no topic</template></category>",
    ));
    assert_eq!(kernel.respond("tell me", "s"), "no topic");
    kernel.set_predicate("topic", "talking about Soylent Green", "s");
    assert_eq!(kernel.respond("tell me", "s"), "Soylent Green is the topic");
}

#[test]
fn input_element_reads_history() {
    let kernel = kernel_with(concat!(
        r#"<category><pattern>TEST INPUT</pattern><template>You just said: <input index="1"/></template></category>"#,
    ));
    assert_eq!(
        kernel.respond("test input", "s"),
        "You just said: test input"
    );
}

#[test]
fn out_of_range_history_indices_read_as_empty() {
    let kernel = kernel_with(concat!(
        r#"<category><pattern>RECALL FAR</pattern><template>[<input index="40"/>]</template></category>"#,
        r#"<category><pattern>RECALL THAT</pattern><template>[<that index="40"/>]</template></category>"#,
    ));
    assert_eq!(kernel.respond("recall far", "s"), "[]");
    assert_eq!(kernel.respond("recall that", "s"), "[]");
}

#[test]
fn star_index_above_one_reads_as_empty() {
    let kernel = kernel_with(
        r#"<category><pattern>GRAB *</pattern><template>[<star index="2"/>]</template></category>"#,
    );
    assert_eq!(kernel.respond("grab this", "s"), "[]");
}

#[test]
fn multiple_sentences_are_answered_in_order() {
    let kernel = kernel_with(concat!(
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
        "<category><pattern>GOODBYE</pattern><template>Bye</template></category>",
    ));
    assert_eq!(kernel.respond("Hello. Goodbye.", "s"), "Hi Bye");
}

#[test]
fn unmatched_sentences_contribute_nothing() {
    let kernel = kernel_with(
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
    );
    assert_eq!(kernel.respond("Hello. Whatever else!", "s"), "Hi");
    assert_eq!(kernel.respond("no category for this", "s"), "");
    assert_eq!(kernel.respond("", "s"), "");
}

#[test]
fn sessions_are_isolated() {
    let kernel = kernel_with(concat!(
        r#"<category><pattern>I LIKE *</pattern><template><set name="fav"><star/></set></template></category>"#,
        r#"<category><pattern>WHAT DO I LIKE</pattern><template>You like <get name="fav"/></template></category>"#,
    ));
    kernel.respond("I like cheese", "alice");
    kernel.respond("I like opera", "bob");
    assert_eq!(kernel.respond("what do I like", "alice"), "You like cheese");
    assert_eq!(kernel.respond("what do I like", "bob"), "You like opera");
}

#[test]
fn bot_predicates_are_global_and_read_only_from_templates() {
    let kernel = kernel_with(
        r#"<category><pattern>WHAT IS YOUR NAME</pattern><template>My name is <bot name="name"/></template></category>"#,
    );
    kernel.set_bot_predicate("name", "Eliza");
    assert_eq!(kernel.respond("what is your name", "a"), "My name is Eliza");
    assert_eq!(kernel.respond("what is your name", "b"), "My name is Eliza");
    assert_eq!(kernel.get_bot_predicate("no such predicate"), "");
}

#[test]
fn bot_name_in_pattern_matches_current_name() {
    let kernel = kernel_with(
        r#"<category><pattern>HELLO <bot name="name"/></pattern><template>You know me</template></category>"#,
    );
    kernel.set_bot_predicate("name", "Eliza");
    assert_eq!(kernel.respond("hello Eliza", "s"), "You know me");
    assert_eq!(kernel.respond("hello Hal", "s"), "");
    kernel.set_bot_predicate("name", "Hal");
    assert_eq!(kernel.respond("hello Hal", "s"), "You know me");
}

#[test]
fn size_reports_category_count() {
    let kernel = kernel_with(concat!(
        "<category><pattern>HOW BIG</pattern><template><size/></template></category>",
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
    ));
    assert_eq!(kernel.num_categories(), 2);
    assert_eq!(kernel.respond("how big", "s"), "2");
}

#[test]
fn version_and_id_elements() {
    let kernel = kernel_with(concat!(
        "<category><pattern>TEST VERSION</pattern><template><version/></template></category>",
        "<category><pattern>TEST ID</pattern><template>Your id is <id/></template></category>",
    ));
    assert_eq!(kernel.respond("test version", "s"), kernel.version());
    assert_eq!(kernel.respond("test id", "somebody"), "Your id is somebody");
}

#[test]
fn learn_element_loads_more_categories() {
    let dir = tempfile::tempdir().unwrap();
    // The path is embedded literally in the template so that sentence
    // splitting never sees it.
    let extra = dir.path().join("extra_aiml");
    std::fs::write(
        &extra,
        common::document("<category><pattern>NEWLY LEARNED</pattern><template>Got it</template></category>"),
    )
    .unwrap();

    let kernel = kernel_with(&format!(
        "<category><pattern>STUDY</pattern><template>Done<learn>{}</learn></template></category>",
        extra.display()
    ));
    assert_eq!(kernel.respond("newly learned", "s"), "");
    assert_eq!(kernel.respond("study", "s"), "Done");
    assert_eq!(kernel.respond("newly learned", "s"), "Got it");
}

#[test]
fn reset_brain_forgets_everything() {
    let kernel = kernel_with(
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
    );
    assert_eq!(kernel.respond("hello", "s"), "Hi");
    kernel.reset_brain();
    assert_eq!(kernel.num_categories(), 0);
    assert_eq!(kernel.respond("hello", "s"), "");
}

#[test]
fn brain_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot.brn");
    {
        let kernel = kernel_with(concat!(
            "<category><pattern>HELLO</pattern><template>Hi</template></category>",
            "<category><pattern>MY NAME IS *</pattern><template>Nice to meet you, <star/></template></category>",
        ));
        kernel.save_brain(&path).unwrap();
    }
    let kernel = Kernel::new();
    kernel.load_brain(&path).unwrap();
    assert_eq!(kernel.num_categories(), 2);
    assert_eq!(kernel.respond("hello", "s"), "Hi");
    assert_eq!(kernel.respond("my name is Alice", "s"), "Nice to meet you, Alice");
}

#[test]
fn bootstrap_loads_and_answers_startup_commands() {
    let kernel = Kernel::new();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        common::document("<category><pattern>PING</pattern><template>pong</template></category>").as_bytes(),
    )
    .unwrap();
    let outputs = kernel
        .bootstrap(
            None,
            &[file.path().to_str().unwrap().to_string()],
            &["ping".to_string(), "unknown".to_string()],
        )
        .unwrap();
    assert_eq!(outputs, vec!["pong".to_string(), String::new()]);
}

#[test]
fn persistent_sessions_survive_kernel_teardown() {
    let dir = tempfile::tempdir().unwrap();
    {
        let kernel = kernel_with(concat!(
            r#"<category><pattern>I LIKE *</pattern><template><set name="fav"><star/></set></template></category>"#,
        ));
        kernel.persistent_sessions(true, Some(dir.path())).unwrap();
        kernel.respond("I like cheese", "alice");
    }
    let kernel = Kernel::new();
    kernel.persistent_sessions(true, Some(dir.path())).unwrap();
    assert_eq!(kernel.get_predicate("fav", "alice"), "cheese");
    assert!(dir.path().join("alice.db").exists());
}

#[test]
fn learning_again_overwrites_without_double_counting() {
    let kernel = kernel_with(
        "<category><pattern>HELLO</pattern><template>Hi</template></category>",
    );
    learn_str(
        &kernel,
        "<category><pattern>HELLO</pattern><template>Howdy</template></category>",
    );
    assert_eq!(kernel.num_categories(), 1);
    assert_eq!(kernel.respond("hello", "s"), "Howdy");
}

#[test]
fn files_that_fail_to_parse_contribute_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad_aiml");
    std::fs::write(
        &bad,
        r#"<aiml version="1.0.1"><category><pattern>X</pattern><template><bogus/></template></category></aiml>"#,
    )
    .unwrap();
    let kernel = Kernel::new();
    kernel.learn(bad.to_str().unwrap()).unwrap();
    assert_eq!(kernel.num_categories(), 0);
}
