//! DAOPHOT and ALLSTAR wrappers against canned tool output.
//!
//! Checks the scripts the wrappers send and how each command's share of the
//! replayed output is parsed.

#![cfg(unix)]

use std::fs;
use std::path::PathBuf;

use photrunner::io::workdir::local_name_for;
use photrunner::pool::{clone_many, run_all};
use photrunner::results::CommandResult;
use photrunner::test_support::{ATTACH_OK, DAOPHOT_BANNER, FakeTool, PSF_FAILED, PSF_OK};
use photrunner::tools::files::{APERTURE_PHOTOMETRY, FOUND_STARS, GROUPS, PSF, PSF_STARS};
use photrunner::tools::{Allstar, AllstarFiles, Apertures, Daophot};
use tempfile::TempDir;

const FIND_OK: &str = "\
 Sky mode and standard deviation =  155.208    7.324

 Clipped mean and median =  155.731  155.454
 Number of pixels used (after clip) = 1,418,539
 Relative error =    1.08

  Relative            Number
  brightness          of stars
     1.0                 450

     450 stars.

Command:";

const ALLSTAR_OUTPUT: &str = "\
 FITTING RADIUS =     2.50     WATCH PROGRESS =     0.00

Input image name:
     1    450      0      0
     2    448      2     37
     3    446      4    402
 Finished.
";

fn replay(parts: &[&str]) -> FakeTool {
    FakeTool::new(&parts.join("\n"), 0)
}

/// An image outside every runner directory.
fn image_fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("image dir");
    let image = dir.path().join("field.fits");
    fs::write(&image, "SIMPLE  =                    T").expect("image");
    (dir, image)
}

#[test]
fn failed_fit_does_not_spoil_earlier_results() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, PSF_FAILED]);
    let (_images, image) = image_fixture();
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");

    let attach = daophot.attach(&image).expect("attach");
    let psf = daophot
        .psf(APERTURE_PHOTOMETRY, PSF_STARS, PSF)
        .expect("psf");
    daophot.run(true).expect("run");

    assert_eq!(attach.picture_size().expect("size"), (1250, 1150));
    assert!(!psf.converged());
    let err = psf.chi().unwrap_err();
    assert!(err.is_parse_failure());
    assert!(err.to_string().contains("Failed to converge"), "{err}");
    assert!(attach.success());
    assert_eq!(tool.launches(), 1);
}

#[test]
fn missing_psf_file_is_reported_by_run_only() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, PSF_FAILED]);
    let (images, image) = image_fixture();
    let psf_path = images.path().join("field.psf");
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");

    let attach = daophot.attach(&image).expect("attach");
    let psf = daophot
        .psf(APERTURE_PHOTOMETRY, PSF_STARS, &psf_path.to_string_lossy())
        .expect("psf");

    assert_eq!(attach.picture_size().expect("first read"), (1250, 1150));
    assert_eq!(attach.picture_size().expect("second read"), (1250, 1150));
    assert!(!psf.converged());
    assert!(psf.chi().unwrap_err().is_parse_failure());

    let err = daophot.run(true).unwrap_err();
    assert!(err.is_staging_failure(), "{err}");
    assert!(err.to_string().contains(&local_name_for(&psf_path)), "{err}");
    assert!(!psf_path.exists());
    assert_eq!(tool.launches(), 1);
}

#[test]
fn immediate_failed_fit_still_hands_back_its_result() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, PSF_FAILED]);
    let (images, image) = image_fixture();
    let psf_path = images.path().join("field.psf");
    let mut daophot = Daophot::new(&tool.config(), None, Some(&image), false).expect("daophot");

    let psf = daophot
        .psf(APERTURE_PHOTOMETRY, PSF_STARS, &psf_path.to_string_lossy())
        .expect("psf result");
    assert_eq!(tool.launches(), 1);
    assert!(!psf.converged());

    let err = daophot.runner_mut().wait_for_results().unwrap_err();
    assert!(err.is_staging_failure(), "{err}");
}

#[test]
fn batch_script_starts_with_attach_and_ends_with_exit() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, PSF_OK]);
    let (_images, image) = image_fixture();
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");

    daophot.attach(&image).expect("attach");
    let psf = daophot
        .psf(APERTURE_PHOTOMETRY, PSF_STARS, PSF)
        .expect("psf");
    psf.check().expect("fit");

    let local = local_name_for(&image);
    assert_eq!(
        tool.last_stdin(),
        format!("ATTACH\n{local}\nPSF\ni.ap\ni.lst\ni.psf\nEXIT\n")
    );
    assert!(daophot.runner().exists(&local));
    assert!(daophot.runner().exists("daophot.opt"));
    assert!(daophot.runner().exists("photo.opt"));

    assert_eq!(psf.chi().expect("chi"), 0.0333);
    assert_eq!(psf.hwhm_xy().expect("hwhm"), (1.50420, 1.39658));
    assert_eq!(
        psf.errors().expect("errors"),
        vec![(3, 0.036), (12, 0.029), (41, 0.071)]
    );
    let startup = daophot.startup_options().expect("startup options");
    assert_eq!(startup.get("fitting radius").expect("fi"), 3.0);
}

#[test]
fn immediate_mode_reattaches_the_default_image_every_round() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, FIND_OK]);
    let (_images, image) = image_fixture();
    let mut daophot = Daophot::new(&tool.config(), None, None, false).expect("daophot");

    let attach = daophot.attach(&image).expect("attach");
    assert_eq!(tool.launches(), 1);
    assert_eq!(attach.picture_size().expect("size"), (1250, 1150));

    let find = daophot.find(1, 1, FOUND_STARS).expect("find");
    assert_eq!(tool.launches(), 2);
    let local = local_name_for(&image);
    assert_eq!(
        tool.last_stdin(),
        format!("ATTACH\n{local}\nFIND\n1,1\ni.coo\nyes\nEXIT\n")
    );

    let stats = find.stats().expect("stats");
    assert_eq!(stats.sky, 155.208);
    assert_eq!(stats.pixels, 1_418_539);
    assert_eq!(find.stars().expect("stars"), 450);
}

#[test]
fn photometry_and_pick_scripts_carry_their_arguments() {
    let tool = replay(&[DAOPHOT_BANNER]);
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");
    let apertures = Apertures {
        inner_sky: Some(8.0),
        outer_sky: Some(14.0),
        radii: vec![3.0, 4.0],
    };

    daophot
        .photometry(&apertures, FOUND_STARS, APERTURE_PHOTOMETRY)
        .expect("phot");
    daophot
        .pick(APERTURE_PHOTOMETRY, 40, 18.5, PSF_STARS)
        .expect("pick");
    let script = daophot.runner().pending_script();
    assert_eq!(
        script,
        format!(
            "PHOT\nphoto.opt\n{}\ni.coo\ni.ap\nPICK\ni.ap\n40,18.5\ni.lst\n",
            "A1=3.00\nA2=4.00\nIS=8.00\nOS=14.00\n"
        )
    );
}

#[test]
fn options_are_sent_as_two_letter_assignments() {
    let tool = replay(&[DAOPHOT_BANNER]);
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");
    daophot
        .options(&[("FITTING RADIUS", 2.5), ("th", 3.0)])
        .expect("options");
    assert_eq!(
        daophot.runner().pending_script(),
        "OPT\n\nFITTING RADIUS=2.50\nth=3.00\n\n"
    );
}

#[test]
fn substar_and_group_answer_every_prompt() {
    let tool = replay(&[DAOPHOT_BANNER]);
    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");

    daophot
        .substar(PSF, APERTURE_PHOTOMETRY, Some("keep.lst"), "i.sub")
        .expect("substar keeping stars");
    daophot
        .substar(PSF, "i.als", None, "i.sub2")
        .expect("substar");
    daophot
        .group(APERTURE_PHOTOMETRY, PSF, 0.1, GROUPS)
        .expect("group");

    assert_eq!(
        daophot.runner().pending_script(),
        concat!(
            "SUBSTAR\ni.psf\ni.ap\ny\nkeep.lst\ni.sub\n",
            "SUBSTAR\ni.psf\ni.als\nn\ni.sub2\n",
            "GROUP\ni.ap\ni.psf\n0.10\ni.grp\n",
        )
    );
}

#[test]
fn option_files_are_staged_into_the_directory() {
    let tool = replay(&[DAOPHOT_BANNER]);
    let dir = tempfile::tempdir().expect("opt dir");
    let custom = dir.path().join("custom.opt");
    fs::write(&custom, "FI = 4.0\n").expect("opt");

    let mut daophot = Daophot::new(&tool.config(), None, None, true).expect("daophot");
    daophot.options_file(&custom).expect("options file");
    let local = local_name_for(&custom);
    assert_eq!(daophot.runner().pending_script(), format!("OPT\n{local}\n\n"));
    assert!(daophot.runner().exists(&local));

    let mut allstar = Allstar::new(&tool.config(), None, None, true).expect("allstar");
    allstar.options_file(&custom).expect("allstar options file");
    assert_eq!(
        fs::read_to_string(allstar.runner().resolve("allstar.opt")).expect("read"),
        "FI = 4.0\n"
    );
}

#[test]
fn allstar_sends_options_before_files() {
    let tool = replay(&[ALLSTAR_OUTPUT]);
    let mut allstar = Allstar::new(&tool.config(), None, None, true).expect("allstar");
    allstar.set_option("fitting radius", Some(2.5));

    let run = allstar.allstar(&AllstarFiles::default()).expect("queue");
    allstar.run(true).expect("run");

    assert_eq!(
        tool.last_stdin(),
        "FI=2.50\nWA=0.00\n\ni.fits\ni.psf\ni.ap\ni.als\n\n"
    );
    assert_eq!(run.options.get("WA").expect("watch"), 0.0);
    assert_eq!(run.result.stars_no().expect("stars"), (4, 402));
    assert!(allstar.runner().exists("allstar.opt"));
}

#[test]
fn a_second_allstar_replaces_the_queued_one() {
    let tool = replay(&[ALLSTAR_OUTPUT]);
    let mut allstar = Allstar::new(&tool.config(), None, None, true).expect("allstar");

    allstar.allstar(&AllstarFiles::default()).expect("first");
    let files = AllstarFiles {
        subtracted_image: Some("i.sub.fits".to_string()),
        ..AllstarFiles::default()
    };
    let run = allstar.allstar(&files).expect("second");
    run.result.check().expect("result");

    assert_eq!(tool.launches(), 1);
    assert_eq!(
        tool.last_stdin(),
        "WA=0.00\n\ni.fits\ni.psf\ni.ap\ni.als\ni.sub.fits\n"
    );
}

#[test]
fn cloned_workers_fit_in_parallel() {
    let tool = replay(&[DAOPHOT_BANNER, ATTACH_OK, PSF_OK]);
    let (_images, image) = image_fixture();
    let template = Daophot::new(&tool.config(), None, Some(&image), true).expect("template");

    let mut workers = clone_many(&template, 3).expect("clones");
    let fits: Vec<_> = workers
        .iter_mut()
        .map(|worker| worker.psf(APERTURE_PHOTOMETRY, PSF_STARS, PSF).expect("psf"))
        .collect();
    let outcomes = run_all(&mut workers, 2);

    assert!(outcomes.iter().all(Result::is_ok));
    for fit in &fits {
        assert_eq!(fit.chi().expect("chi"), 0.0333);
    }
    let mut dirs = tool.launch_dirs();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), 3);
    assert_eq!(template.runner().launch_count(), 0);
}
